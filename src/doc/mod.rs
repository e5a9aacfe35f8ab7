// (c) 2024 Ross Younger

//! 📖 Additional documentation

pub mod troubleshooting;
