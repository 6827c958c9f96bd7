pub mod config;
pub mod container;
pub mod error;
pub mod live;
mod registry;

pub use error::Error;
pub use registry::RootRegistry;

pub type Result<T> = std::result::Result<T, crate::Error>;

#[macro_export]
macro_rules! none_to_continue {
    ($r:expr) => {
        match $r {
            Some(r) => r,
            None => continue,
        }
    };

    ($r:expr, $l:tt) => {
        match $r {
            Some(r) => r,
            None => continue $l,
        }
    };
}
