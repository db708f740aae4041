mod health;
mod url;
mod user;

pub use health::{health_handler, ping_handler};
pub use url::{create_batch_handler, create_url_handler, create_url_text_handler, redirect_handler};
pub use user::{delete_user_urls_handler, list_user_urls_handler};
