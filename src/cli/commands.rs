pub mod initdb;
pub mod issue_token;
pub mod serve;

pub use initdb::init_database;
pub use issue_token::issue_token;
pub use serve::serve;
