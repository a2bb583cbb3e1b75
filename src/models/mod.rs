mod pushed;
mod registration;
mod user;

pub use pushed::{PushedData, PushedDataView, PushedFields};
pub use registration::{recent_cutoff, NewRegistration, RegistrationInfo};
pub use user::{generate_token, hash_token, is_valid_username, User, UserView};
