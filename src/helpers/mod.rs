pub mod aggregate;
pub mod delivery;
pub mod llm;
pub mod retriever;
pub mod storage;
pub mod summary;
pub mod validator;
pub mod xlsx;
