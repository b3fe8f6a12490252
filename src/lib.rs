pub mod chat;
pub mod logging;
pub mod server;
pub mod social;
pub mod storage;
