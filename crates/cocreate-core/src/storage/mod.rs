pub mod history;
pub mod kv;

pub use history::ChatHistory;
pub use kv::KvStore;
