pub mod pxd;
pub mod pxd_gen;
