mod convolve;
mod equalize;
mod grayscale;
mod gradient;
mod integral;
mod sobel;

pub use convolve::{horizontal_convolve, separable_convolve, vertical_convolve};
pub use equalize::{equalize_hist, equalized};
pub use grayscale::{grayscale, GrayscaleOutput};
pub use gradient::{find_max_index, gradient_x, gradient_y, horizontal_symmetry, projection_x, projection_y};
pub use integral::{compute_integral_images, IntegralImages, IntegralRequest, Rsat, Sat};
pub use sobel::{sobel, sobel_gx, sobel_gy};
