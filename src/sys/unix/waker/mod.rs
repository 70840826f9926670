pub mod eventfd;
pub mod pipe;
