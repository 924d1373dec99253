pub mod environment;
pub mod paths;
pub mod terminal;
pub mod text;

pub use environment::get_home_dir;
pub use paths::{
    decode_project_dir, file_size_on_disk, format_path_with_tilde, repo_name_from_cwd,
    validate_decoded_path,
};
pub use terminal::{sanitize_line, strip_ansi_codes};
pub use text::{contains_ignore_case, truncate_chars};
