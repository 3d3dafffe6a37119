//! Configuration loading and parsing.
//!
//! The on-disk format is a flat `key=value` file (`#` starts a comment,
//! values may be quoted); the same keys arrive URL-encoded in the
//! `QUERY_STRING` when running as a CGI. Both paths funnel into
//! [`RenderConfig::set_option`], which is the single source of truth for key
//! names. Privileged keys (thread counts, buffer sizes, CGI caps, file
//! locations) are only honored when the assignment does *not* come from a
//! query string, and [`RenderConfig::apply_cgi_caps`] clamps the
//! remotely-settable values before any memory is allocated.
//!
//! Unknown keys are ignored: the config file doubles as a scratchpad for
//! other tools in the toolchain and forward compatibility matters more than
//! typo detection here.

use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

mod parse;

pub use parse::sanitize_query_string;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid value {value:?} for option {key}")]
    InvalidValue { key: String, value: String },
    #[error("{0}")]
    Invalid(String),
}

/// Distance gate reference point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceSelector {
    #[default]
    Camera,
    Target,
}

/// Intensity gate reference point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntensitySelector {
    #[default]
    Camera,
    Earth,
    /// Absolute magnitude, i.e. intensity at 10 pc.
    Absolute,
}

/// Per-pixel saturation behavior once a channel exceeds 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelLimitMode {
    /// Clamp each channel independently (overexposes to white).
    #[default]
    Saturate,
    /// Scale all channels by the max channel (preserves hue).
    PreserveColor,
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Png,
    Exr,
    Jpeg,
    Avif,
    Heif,
}

impl ImageFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "0" | "png" => Some(Self::Png),
            "1" | "exr" => Some(Self::Exr),
            "2" | "jpg" | "jpeg" => Some(Self::Jpeg),
            "3" | "avif" => Some(Self::Avif),
            "4" | "heif" => Some(Self::Heif),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Exr => "image/x-exr",
            Self::Jpeg => "image/jpeg",
            Self::Avif => "image/avif",
            Self::Heif => "image/heif",
        }
    }

    pub fn default_file_name(self) -> &'static str {
        match self {
            Self::Png => "galaxy.png",
            Self::Exr => "galaxy.exr",
            Self::Jpeg => "galaxy.jpg",
            Self::Avif => "galaxy.avif",
            Self::Heif => "galaxy.heif",
        }
    }
}

/// Number format of one color sample in the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberFormat {
    #[default]
    UnsignedInt,
    Float,
}

/// Color space selector. Controls the encoding gamma in the sequencer and
/// the chromaticities attribute in the EXR header. ICC blobs themselves are
/// not embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorProfile {
    /// No profile, linear transfer.
    Linear,
    #[default]
    Srgb,
    DisplayP3,
    Rec2020,
    Rec601Ntsc,
    Rec601Pal,
    Rec709,
    Flat2,
    Rec2100Pq,
}

impl ColorProfile {
    fn from_index(i: i64) -> Option<Self> {
        match i {
            0 => Some(Self::Linear),
            1 => Some(Self::Srgb),
            2 => Some(Self::DisplayP3),
            3 => Some(Self::Rec2020),
            4 => Some(Self::Rec601Ntsc),
            5 => Some(Self::Rec601Pal),
            6 => Some(Self::Rec709),
            7 => Some(Self::Flat2),
            8 => Some(Self::Rec2100Pq),
            _ => None,
        }
    }
}

/// Every recognized configuration option with its default value. Field
/// names track the config keys; see `set_option` for the exact spellings
/// (a few keys keep historic capitalization such as `Mollewide_iterations`).
#[derive(Debug, Clone)]
pub struct RenderConfig {
    // file locations (privileged)
    pub data_file_directory: String,
    pub output_file_name: Option<String>,

    // parallelism (privileged)
    pub num_threads: u32,
    pub per_thread_buffer: usize,
    pub per_thread_buffer_airy: usize,

    // CGI operation (privileged)
    pub cgi_mode: bool,
    pub cgi_max_res_x: u32,
    pub cgi_max_res_y: u32,
    pub cgi_gaia_min_parallax_quality: u32,
    pub cgi_allow_airy_disk: bool,
    pub cgi_min_airy_disk_first_null: f64,
    pub cgi_max_airy_disk_max_extent: u32,
    pub print_status: bool,

    // catalog selection
    pub gaia_db_enable: bool,
    pub gaia_min_parallax_quality: u32,
    pub external_db_enable: bool,

    // star filters
    pub render_distance_min: f64,
    pub render_distance_max: f64,
    pub render_distance_selector: DistanceSelector,
    pub star_intensity_min_mag: f64,
    pub star_intensity_max_mag: f64,
    pub star_intensity_selector: IntensitySelector,
    pub star_color_min: f64,
    pub star_color_max: f64,
    pub extinction_dimming_undo: bool,
    pub extinction_reddening_undo: bool,

    // camera
    pub camera_res_x: u32,
    pub camera_res_y: u32,
    pub camera_fov: f64,
    pub camera_pixel_limit_mag: f64,
    pub camera_pixel_limit_mode: PixelLimitMode,
    pub camera_wb_enable: bool,
    pub camera_wb_temp: f64,
    pub camera_color_saturation: f64,
    pub camera_gamma: f64,
    pub camera_projection: u8,
    pub spherical_orientation: u8,
    pub mollweide_iterations: u32,

    // camera filter bands (nm)
    pub red_filter_long_limit: f64,
    pub red_filter_short_limit: f64,
    pub green_filter_long_limit: f64,
    pub green_filter_short_limit: f64,
    pub blue_filter_long_limit: f64,
    pub blue_filter_short_limit: f64,

    // point spread
    pub airy_disk_enable: bool,
    pub airy_disk_first_null: f64,
    pub airy_disk_max_extent: u32,
    pub airy_disk_min_extent: u32,
    pub airy_disk_obstruction: f64,
    pub anti_alias_enable: bool,
    pub anti_alias_radius: f64,

    // background
    pub skyglow_enable: bool,
    pub skyglow_temp: f64,
    pub skyglow_per_pixel_mag: f64,

    // post-processing
    pub gaussian_blur_radius: f64,
    pub output_scaling_factor: f64,
    pub lanczos_order: u32,
    pub draw_crosshairs: bool,
    pub draw_grid_lines: bool,

    // output encoding
    pub bits_per_color: u32,
    pub image_format: ImageFormat,
    pub image_number_format: NumberFormat,
    pub color_profile: ColorProfile,
    pub compression_quality: u8,

    // camera and target position
    pub camera_icrs_x: f64,
    pub camera_icrs_y: f64,
    pub camera_icrs_z: f64,
    pub camera_icrs_ra: f64,
    pub camera_icrs_dec: f64,
    pub camera_icrs_r: f64,
    pub target_icrs_x: f64,
    pub target_icrs_y: f64,
    pub target_icrs_z: f64,
    pub target_icrs_ra: f64,
    pub target_icrs_dec: f64,
    pub target_icrs_r: f64,
    pub camera_rotation: f64,
    pub camera_pan: f64,
    pub camera_tilt: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            data_file_directory: "./galaxydata".to_string(),
            output_file_name: None,
            num_threads: 16,
            per_thread_buffer: 10_000,
            per_thread_buffer_airy: 200_000,
            cgi_mode: false,
            cgi_max_res_x: 999_999,
            cgi_max_res_y: 999_999,
            cgi_gaia_min_parallax_quality: 0,
            cgi_allow_airy_disk: true,
            cgi_min_airy_disk_first_null: 0.3,
            cgi_max_airy_disk_max_extent: 1000,
            print_status: true,
            gaia_db_enable: true,
            gaia_min_parallax_quality: 0,
            external_db_enable: true,
            render_distance_min: 0.0,
            render_distance_max: 1.0E99,
            render_distance_selector: DistanceSelector::Camera,
            star_intensity_min_mag: 99.0,
            star_intensity_max_mag: -99.0,
            star_intensity_selector: IntensitySelector::Camera,
            star_color_min: 0.0,
            star_color_max: 1.0E99,
            extinction_dimming_undo: false,
            extinction_reddening_undo: false,
            camera_res_x: 2000,
            camera_res_y: 1000,
            camera_fov: 360.0,
            camera_pixel_limit_mag: 6.5,
            camera_pixel_limit_mode: PixelLimitMode::Saturate,
            camera_wb_enable: true,
            camera_wb_temp: 4300.0,
            camera_color_saturation: 1.0,
            camera_gamma: 1.0,
            camera_projection: 0,
            spherical_orientation: 0,
            mollweide_iterations: 5,
            red_filter_long_limit: 705.0,
            red_filter_short_limit: 550.0,
            green_filter_long_limit: 600.0,
            green_filter_short_limit: 445.0,
            blue_filter_long_limit: 465.0,
            blue_filter_short_limit: 395.0,
            airy_disk_enable: false,
            airy_disk_first_null: 0.75,
            airy_disk_max_extent: 100,
            airy_disk_min_extent: 1,
            airy_disk_obstruction: 0.0,
            anti_alias_enable: false,
            anti_alias_radius: 1.0,
            skyglow_enable: false,
            skyglow_temp: 4500.0,
            skyglow_per_pixel_mag: 11.0,
            gaussian_blur_radius: 0.0,
            output_scaling_factor: 1.0,
            lanczos_order: 3,
            draw_crosshairs: false,
            draw_grid_lines: false,
            bits_per_color: 8,
            image_format: ImageFormat::Png,
            image_number_format: NumberFormat::UnsignedInt,
            color_profile: ColorProfile::Srgb,
            compression_quality: 90,
            camera_icrs_x: 0.0,
            camera_icrs_y: 0.0,
            camera_icrs_z: 0.0,
            camera_icrs_ra: 0.0,
            camera_icrs_dec: 0.0,
            camera_icrs_r: 0.0,
            target_icrs_x: 0.0,
            target_icrs_y: 0.0,
            target_icrs_z: 0.0,
            target_icrs_ra: 266.416_837_1,
            target_icrs_dec: -29.007_810_6,
            target_icrs_r: 8178.0,
            camera_rotation: -58.6,
            camera_pan: 0.0,
            camera_tilt: 0.0,
        }
    }
}

/// Who supplied an assignment; query-string assignments cannot touch
/// privileged keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionSource {
    ConfigFile,
    CommandLine,
    QueryString,
}

impl fmt::Display for OptionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigFile => write!(f, "config file"),
            Self::CommandLine => write!(f, "command line"),
            Self::QueryString => write!(f, "query string"),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    // historic behavior: anything containing "yes" enables, everything else
    // disables
    value.to_ascii_lowercase().contains("yes")
}

macro_rules! set_num {
    ($field:expr, $key:expr, $value:expr, $ty:ty) => {{
        match $value.parse::<$ty>() {
            Ok(v) => $field = v,
            Err(_) => {
                return Err(ConfigError::InvalidValue {
                    key: $key.to_string(),
                    value: $value.to_string(),
                });
            }
        }
    }};
}

impl RenderConfig {
    /// Apply one `key=value` assignment. Unknown keys are logged and
    /// ignored. Returns an error only for a recognized key with an
    /// unparsable value.
    pub fn set_option(
        &mut self,
        key: &str,
        value: &str,
        source: OptionSource,
    ) -> Result<(), ConfigError> {
        let privileged_ok = source != OptionSource::QueryString;

        if privileged_ok {
            match key {
                "data_file_directory" => {
                    self.data_file_directory = value.to_string();
                    return Ok(());
                }
                "output_file_name" => {
                    self.output_file_name = Some(value.to_string());
                    return Ok(());
                }
                "num_threads" => {
                    set_num!(self.num_threads, key, value, u32);
                    return Ok(());
                }
                "per_thread_buffer" => {
                    set_num!(self.per_thread_buffer, key, value, usize);
                    return Ok(());
                }
                "per_thread_buffer_Airy" => {
                    set_num!(self.per_thread_buffer_airy, key, value, usize);
                    return Ok(());
                }
                "cgi_mode" => {
                    self.cgi_mode = parse_bool(value);
                    return Ok(());
                }
                "cgi_max_res_x" => {
                    set_num!(self.cgi_max_res_x, key, value, u32);
                    return Ok(());
                }
                "cgi_max_res_y" => {
                    set_num!(self.cgi_max_res_y, key, value, u32);
                    return Ok(());
                }
                "cgi_Gaia_min_parallax_quality" => {
                    set_num!(self.cgi_gaia_min_parallax_quality, key, value, u32);
                    return Ok(());
                }
                "cgi_allow_Airy_disk" => {
                    self.cgi_allow_airy_disk = parse_bool(value);
                    return Ok(());
                }
                "cgi_min_Airy_disk_first_null" => {
                    set_num!(self.cgi_min_airy_disk_first_null, key, value, f64);
                    return Ok(());
                }
                "cgi_max_Airy_disk_max_extent" => {
                    set_num!(self.cgi_max_airy_disk_max_extent, key, value, u32);
                    return Ok(());
                }
                "print_status" => {
                    self.print_status = parse_bool(value);
                    return Ok(());
                }
                _ => {}
            }
        } else if matches!(
            key,
            "data_file_directory"
                | "output_file_name"
                | "num_threads"
                | "per_thread_buffer"
                | "per_thread_buffer_Airy"
                | "cgi_mode"
                | "cgi_max_res_x"
                | "cgi_max_res_y"
                | "cgi_Gaia_min_parallax_quality"
                | "cgi_allow_Airy_disk"
                | "cgi_min_Airy_disk_first_null"
                | "cgi_max_Airy_disk_max_extent"
                | "print_status"
        ) {
            warn!(key, "ignoring privileged option from query string");
            return Ok(());
        }

        match key {
            "enable_Gaia" => self.gaia_db_enable = parse_bool(value),
            "Gaia_min_parallax_quality" => {
                set_num!(self.gaia_min_parallax_quality, key, value, u32)
            }
            "enable_external" => self.external_db_enable = parse_bool(value),
            "render_distance_min" => set_num!(self.render_distance_min, key, value, f64),
            "render_distance_max" => set_num!(self.render_distance_max, key, value, f64),
            "render_distance_selector" => {
                self.render_distance_selector = match value {
                    "0" => DistanceSelector::Camera,
                    "1" => DistanceSelector::Target,
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            key: key.to_string(),
                            value: value.to_string(),
                        });
                    }
                }
            }
            "star_intensity_min" => set_num!(self.star_intensity_min_mag, key, value, f64),
            "star_intensity_max" => set_num!(self.star_intensity_max_mag, key, value, f64),
            "star_intensity_selector" => {
                self.star_intensity_selector = match value {
                    "0" => IntensitySelector::Camera,
                    "1" => IntensitySelector::Earth,
                    "2" => IntensitySelector::Absolute,
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            key: key.to_string(),
                            value: value.to_string(),
                        });
                    }
                }
            }
            "star_color_min" => set_num!(self.star_color_min, key, value, f64),
            "star_color_max" => set_num!(self.star_color_max, key, value, f64),
            "extinction_dimming_undo" => self.extinction_dimming_undo = parse_bool(value),
            "extinction_reddening_undo" => self.extinction_reddening_undo = parse_bool(value),
            "camera_res_x" => set_num!(self.camera_res_x, key, value, u32),
            "camera_res_y" => set_num!(self.camera_res_y, key, value, u32),
            "camera_fov" => set_num!(self.camera_fov, key, value, f64),
            "camera_pixel_limit_mag" => set_num!(self.camera_pixel_limit_mag, key, value, f64),
            "camera_pixel_limit_mode" => {
                self.camera_pixel_limit_mode = match value {
                    "0" => PixelLimitMode::Saturate,
                    "1" => PixelLimitMode::PreserveColor,
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            key: key.to_string(),
                            value: value.to_string(),
                        });
                    }
                }
            }
            "camera_wb_enable" => self.camera_wb_enable = parse_bool(value),
            "camera_wb_temp" => set_num!(self.camera_wb_temp, key, value, f64),
            "camera_color_saturation" => set_num!(self.camera_color_saturation, key, value, f64),
            "camera_gamma" => set_num!(self.camera_gamma, key, value, f64),
            "camera_projection" => set_num!(self.camera_projection, key, value, u8),
            "spherical_orientation" => set_num!(self.spherical_orientation, key, value, u8),
            "Mollewide_iterations" => set_num!(self.mollweide_iterations, key, value, u32),
            "red_filter_long_limit" => set_num!(self.red_filter_long_limit, key, value, f64),
            "red_filter_short_limit" => set_num!(self.red_filter_short_limit, key, value, f64),
            "green_filter_long_limit" => set_num!(self.green_filter_long_limit, key, value, f64),
            "green_filter_short_limit" => set_num!(self.green_filter_short_limit, key, value, f64),
            "blue_filter_long_limit" => set_num!(self.blue_filter_long_limit, key, value, f64),
            "blue_filter_short_limit" => set_num!(self.blue_filter_short_limit, key, value, f64),
            "Airy_disk" => self.airy_disk_enable = parse_bool(value),
            "Airy_disk_first_null" => set_num!(self.airy_disk_first_null, key, value, f64),
            "Airy_disk_max_extent" => set_num!(self.airy_disk_max_extent, key, value, u32),
            "Airy_disk_min_extent" => set_num!(self.airy_disk_min_extent, key, value, u32),
            "Airy_disk_obstruction" => set_num!(self.airy_disk_obstruction, key, value, f64),
            "anti_alias_enable" => self.anti_alias_enable = parse_bool(value),
            "anti_alias_radius" => set_num!(self.anti_alias_radius, key, value, f64),
            "skyglow_enable" => self.skyglow_enable = parse_bool(value),
            "skyglow_temp" => set_num!(self.skyglow_temp, key, value, f64),
            "skyglow_per_pixel_mag" => set_num!(self.skyglow_per_pixel_mag, key, value, f64),
            "Gaussian_blur_radius" => set_num!(self.gaussian_blur_radius, key, value, f64),
            "output_scaling_factor" => set_num!(self.output_scaling_factor, key, value, f64),
            "Lanczos_order" => set_num!(self.lanczos_order, key, value, u32),
            "draw_crosshairs" => self.draw_crosshairs = parse_bool(value),
            "draw_grid_lines" => self.draw_grid_lines = parse_bool(value),
            "bits_per_color" => set_num!(self.bits_per_color, key, value, u32),
            "image_format" => {
                self.image_format = ImageFormat::parse(value).ok_or(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?
            }
            "image_number_format" => {
                self.image_number_format = match value {
                    "0" => NumberFormat::UnsignedInt,
                    "1" => NumberFormat::Float,
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            key: key.to_string(),
                            value: value.to_string(),
                        });
                    }
                }
            }
            "icc_profile" | "color_profile" => {
                let index = value.parse::<i64>().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
                self.color_profile =
                    ColorProfile::from_index(index).ok_or(ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?
            }
            "compression_quality" => set_num!(self.compression_quality, key, value, u8),
            "camera_icrs_x" => set_num!(self.camera_icrs_x, key, value, f64),
            "camera_icrs_y" => set_num!(self.camera_icrs_y, key, value, f64),
            "camera_icrs_z" => set_num!(self.camera_icrs_z, key, value, f64),
            "camera_icrs_ra" => set_num!(self.camera_icrs_ra, key, value, f64),
            "camera_icrs_dec" => set_num!(self.camera_icrs_dec, key, value, f64),
            "camera_icrs_r" => set_num!(self.camera_icrs_r, key, value, f64),
            "target_icrs_x" => set_num!(self.target_icrs_x, key, value, f64),
            "target_icrs_y" => set_num!(self.target_icrs_y, key, value, f64),
            "target_icrs_z" => set_num!(self.target_icrs_z, key, value, f64),
            "target_icrs_ra" => set_num!(self.target_icrs_ra, key, value, f64),
            "target_icrs_dec" => set_num!(self.target_icrs_dec, key, value, f64),
            "target_icrs_r" => set_num!(self.target_icrs_r, key, value, f64),
            "camera_rotation" => set_num!(self.camera_rotation, key, value, f64),
            "camera_pan" => set_num!(self.camera_pan, key, value, f64),
            "camera_tilt" => set_num!(self.camera_tilt, key, value, f64),
            _ => {
                debug!(key, %source, "ignoring unrecognized option");
            }
        }
        Ok(())
    }

    /// Load assignments from a `key=value` config file. A missing file is
    /// not an error (the defaults describe a full render); an unreadable
    /// file is.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        for (key, value) in parse::file_assignments(&text) {
            self.set_option(key, value, OptionSource::ConfigFile)?;
        }
        Ok(())
    }

    /// Load assignments from an already-sanitized CGI query string.
    pub fn load_query_string(&mut self, query: &str) -> Result<(), ConfigError> {
        for (key, value) in parse::query_assignments(query) {
            self.set_option(key, value, OptionSource::QueryString)?;
        }
        Ok(())
    }

    /// Clamp the remotely-settable values to the operator-configured CGI
    /// limits. Must run after `load_query_string` and before any buffer is
    /// sized from the resolution.
    pub fn apply_cgi_caps(&mut self) {
        self.camera_res_x = self.camera_res_x.clamp(1, self.cgi_max_res_x);
        self.camera_res_y = self.camera_res_y.clamp(1, self.cgi_max_res_y);
        if self.gaia_min_parallax_quality < self.cgi_gaia_min_parallax_quality {
            self.gaia_min_parallax_quality = self.cgi_gaia_min_parallax_quality;
        }
        if !self.cgi_allow_airy_disk {
            self.airy_disk_enable = false;
        }
        if self.airy_disk_first_null < self.cgi_min_airy_disk_first_null {
            self.airy_disk_first_null = self.cgi_min_airy_disk_first_null;
        }
        self.airy_disk_max_extent = self
            .airy_disk_max_extent
            .min(self.cgi_max_airy_disk_max_extent);
        self.airy_disk_min_extent = self
            .airy_disk_min_extent
            .min(self.cgi_max_airy_disk_max_extent);
    }

    /// Reject combinations no renderer stage can satisfy. Runs once after
    /// all sources have been applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera_res_x == 0 || self.camera_res_y == 0 {
            return Err(ConfigError::Invalid(
                "camera_res_x and camera_res_y must be at least 1".into(),
            ));
        }
        if !(self.camera_fov > 0.0) || self.camera_fov > 360.0 {
            return Err(ConfigError::Invalid(format!(
                "camera_fov {} out of range (0, 360]",
                self.camera_fov
            )));
        }
        if self.camera_projection > 3 {
            return Err(ConfigError::Invalid(format!(
                "camera_projection {} out of range 0-3",
                self.camera_projection
            )));
        }
        if !(self.output_scaling_factor > 0.0) {
            return Err(ConfigError::Invalid(
                "output_scaling_factor must be positive".into(),
            ));
        }
        match (self.image_format, self.bits_per_color) {
            (ImageFormat::Png, 8 | 16) => {}
            (ImageFormat::Jpeg, 8) => {}
            (ImageFormat::Exr, 16 | 32) => {}
            (ImageFormat::Avif | ImageFormat::Heif, _) => {
                return Err(ConfigError::Invalid(format!(
                    "image_format {:?} is not supported by this build",
                    self.image_format
                )));
            }
            (format, bits) => {
                return Err(ConfigError::Invalid(format!(
                    "bits_per_color {bits} is not valid for {format:?} output"
                )));
            }
        }
        if self.image_number_format == NumberFormat::Float && self.image_format != ImageFormat::Exr
        {
            return Err(ConfigError::Invalid(
                "floating-point samples are only available with EXR output".into(),
            ));
        }
        Ok(())
    }

    /// Maximum allowed flux for a single channel; one pixel saturates at
    /// this flux level.
    pub fn camera_pixel_limit(&self) -> f64 {
        100.0_f64.powf(-self.camera_pixel_limit_mag / 5.0)
    }

    /// Resolved output file name (explicit name, or a format-derived
    /// default).
    pub fn output_file_name(&self) -> &str {
        self.output_file_name
            .as_deref()
            .unwrap_or_else(|| self.image_format.default_file_name())
    }
}
