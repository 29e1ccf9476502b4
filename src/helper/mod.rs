pub mod body_helper;
pub mod warp_helper;
