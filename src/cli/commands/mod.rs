mod config;
mod search;
mod status;
mod upload;

pub use config::ConfigCommand;
pub use search::SearchArgs;
pub use upload::UploadArgs;

pub use config::handle_config;
pub use search::handle_search;
pub use status::handle_status;
pub use upload::handle_upload;
