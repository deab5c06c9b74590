//! The physical side of the rig: timing seam, servo arms, GPIO drive.

pub mod clock;
pub mod hardware;
pub mod servo;
