mod snap;

pub use snap::SnapNoder;
