pub mod login;

pub use login::{handle_login, handle_provider};
