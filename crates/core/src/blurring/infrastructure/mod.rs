pub mod cpu_region_blurrer;
mod gaussian;
