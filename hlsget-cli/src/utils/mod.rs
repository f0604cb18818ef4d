mod files;
mod headers;

// Export utility functions
pub use self::files::default_output_path;
pub use self::headers::parse_headers;
