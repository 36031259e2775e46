mod request;
mod token;

pub use self::request::*;
pub use self::token::*;
