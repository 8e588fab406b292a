pub mod handlers;

pub use handlers::{
    CliOverrides, build_config, load_doc_templates, load_footprint, load_urls_from_file,
    load_urls_from_source, parse_footprint_line, parse_url_line, templates_from_document,
};
