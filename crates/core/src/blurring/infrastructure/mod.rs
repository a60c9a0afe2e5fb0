pub mod cpu_box_blurrer;
mod gaussian;
