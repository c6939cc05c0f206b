pub mod camera;
pub mod detection;
pub mod pipeline;
pub mod render;
pub mod shared;

#[cfg(test)]
mod test_support;
