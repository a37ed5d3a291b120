pub mod bridge;
pub mod config;
pub mod effect;
pub mod error;
pub mod lights;

pub mod prelude {
    pub use crate::{bridge::*, config::*, effect::*, error::*, lights::*};
}
