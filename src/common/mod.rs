pub mod layout;
pub mod response;
