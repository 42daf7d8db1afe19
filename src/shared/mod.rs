// This is free and unencumbered software released into the public domain.

mod characteristics;
pub use characteristics::*;

mod config;
pub use config::*;

mod convert;
pub use convert::*;

mod distortion;
pub use distortion::*;

pub mod drivers {
    pub mod synthetic;
}

mod error;
pub use error::*;

mod frame;
pub use frame::*;

mod intrinsics;
pub use intrinsics::*;

mod open;
pub use open::*;

mod pipeline;
pub use pipeline::*;

mod platform;
pub use platform::*;

mod queue;
pub use queue::*;

mod select;
pub use select::*;

mod session;
pub use session::*;

mod texture;
pub use texture::*;
