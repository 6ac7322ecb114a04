use crate::surface::PixelFormat;

/// Options available that influence decoding.
#[derive(Debug, Copy, Clone)]
pub struct DecoderOptions {
    /// The output pixel format expected from a decode procedure.
    out_format:  PixelFormat,
    /// Limits for the decoder. These prevent OOM exhaustion
    max_width:   usize,
    max_height:  usize,
    /// Maximum number of scans to allow in the image
    max_scans:   usize,
    /// Treat warnings as errors.
    strict_mode: bool,
    /// Number of worker threads used for MCU post processing
    num_threads: usize
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            out_format:  PixelFormat::BGRA8,
            max_width:   1 << 15,
            max_height:  1 << 15,
            max_scans:   64,
            strict_mode: false,
            num_threads: num_cpus::get()
        }
    }
}

impl DecoderOptions {
    /// Create a new option struct with the defaults
    #[must_use]
    pub fn new() -> DecoderOptions {
        Self::default()
    }

    /// Get the output pixel format pixels will be decoded into when the
    /// caller does not provide a target surface
    #[must_use]
    pub const fn get_out_format(&self) -> PixelFormat {
        self.out_format
    }

    #[must_use]
    pub fn set_out_format(mut self, format: PixelFormat) -> DecoderOptions {
        self.out_format = format;
        self
    }

    /// Get the maximum width allowed for images
    #[must_use]
    pub const fn get_max_width(&self) -> usize {
        self.max_width
    }

    /// Set maximum width allowed for images
    ///
    /// Can be used to prevent OOM scenarios where the library
    /// over-allocates for corrupt images
    #[must_use]
    pub fn set_max_width(mut self, max_width: usize) -> DecoderOptions {
        self.max_width = max_width;
        self
    }

    /// Get the maximum height allowed for images
    #[must_use]
    pub const fn get_max_height(&self) -> usize {
        self.max_height
    }

    /// Set maximum height allowed for images
    #[must_use]
    pub fn set_max_height(mut self, max_height: usize) -> DecoderOptions {
        self.max_height = max_height;
        self
    }

    /// Get the number of progressive scans allowed in an image
    #[must_use]
    pub const fn get_max_scans(&self) -> usize {
        self.max_scans
    }

    /// Set the number of scans allowed in an image
    ///
    /// Can be used to protect against DOS hangs from corrupt images.
    /// Default is 64.
    #[must_use]
    pub fn set_max_scans(mut self, scans: usize) -> DecoderOptions {
        self.max_scans = scans;
        self
    }

    /// Get whether the library will treat warnings as errors
    #[must_use]
    pub const fn get_strict_mode(&self) -> bool {
        self.strict_mode
    }

    /// Set whether to treat warnings as errors
    #[must_use]
    pub fn set_strict_mode(mut self, choice: bool) -> DecoderOptions {
        self.strict_mode = choice;
        self
    }

    /// Get the number of threads used for post processing
    #[must_use]
    pub const fn get_num_threads(&self) -> usize {
        self.num_threads
    }

    /// Set the number of threads used for post processing
    ///
    /// A value of one (or zero) disables the worker pool entirely and
    /// everything runs on the calling thread.
    #[must_use]
    pub fn set_num_threads(mut self, threads: usize) -> DecoderOptions {
        self.num_threads = threads;
        self
    }
}
