use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::compression::CompressionLevel;
use crate::scan::ScanOptions;

pub mod combine;
pub mod compression;
pub mod cut;
pub mod extract;
pub mod finalize;
pub mod formats;
pub mod identify;
pub mod unpack;

/// Options shared by the scan commands. Flags override values from
/// `--config`.
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Source file or directory
    #[arg(short, long)]
    pub source: PathBuf,

    /// Output directory
    #[arg(short, long)]
    pub destination: PathBuf,

    /// TOML file with scan options
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Process everything, but write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum archive nesting depth (0 = unlimited)
    #[arg(long)]
    pub max_depth: Option<u32>,

    /// Worker threads (0 = all cores)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Suppress progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

impl ScanArgs {
    /// Load `--config` (or defaults) and apply the common flags.
    pub fn options(&self) -> anyhow::Result<ScanOptions> {
        let mut options = match &self.config {
            Some(path) => ScanOptions::from_toml_file(path)?,
            None => ScanOptions::new(),
        };
        if self.dry_run {
            options.dry_run = true;
        }
        if let Some(depth) = self.max_depth {
            options.max_depth = depth;
        }
        if let Some(threads) = self.threads {
            options.threads = threads;
        }
        Ok(options)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract textures as Dolphin-named PNG files
    Extract {
        #[command(flatten)]
        scan: ScanArgs,

        /// Also write mip levels
        #[arg(long)]
        mips: bool,

        /// Also copy raw texture files to ~Raw
        #[arg(long)]
        raw: bool,

        /// Try every decompressor on unknown files
        #[arg(long)]
        force: bool,

        /// Do not treat a non-zero max LOD as having mips
        #[arg(long)]
        no_dolphin_mips: bool,

        /// Do not detect hand-made mipmaps
        #[arg(long)]
        no_arbitrary_mips: bool,
    },

    /// Deduplicate and shrink a directory of extracted textures
    Finalize {
        #[command(flatten)]
        scan: ScanArgs,
    },

    /// Decompress files and export archives
    Unpack {
        #[command(flatten)]
        scan: ScanArgs,

        /// Replace existing output directories
        #[arg(long)]
        overwrite: bool,
    },

    /// Split blobs into the files embedded in them
    Cut {
        #[command(flatten)]
        scan: ScanArgs,

        /// Identifier to search for instead of the known formats, as text
        /// or 0x-prefixed hex (repeatable)
        #[arg(short, long = "pattern")]
        patterns: Vec<String>,

        /// Replace existing output files
        #[arg(long)]
        overwrite: bool,
    },

    /// Merge palette variants of split RGBA textures in a texture dump
    Combine {
        #[command(flatten)]
        scan: ScanArgs,
    },

    /// Identify the format of files
    Identify {
        /// Files to identify
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print one JSON object per file
        #[arg(long)]
        json: bool,
    },

    /// Compress a file, or every file of a directory
    Compress {
        /// Source file or directory
        #[arg(short, long)]
        source: PathBuf,

        /// Destination file or directory
        #[arg(short, long)]
        destination: PathBuf,

        /// Replace existing files when compressing a directory
        #[arg(long)]
        overwrite: bool,

        /// Codec (yaz0, zlib, lz4)
        #[arg(short, long, default_value = "yaz0")]
        codec: String,

        /// Compression level
        #[arg(short, long, value_enum, default_value_t = LevelArg::Optimal)]
        level: LevelArg,
    },

    /// Decompress a file, detecting the codec
    Decompress {
        /// Source file
        #[arg(short, long)]
        source: PathBuf,

        /// Destination file
        #[arg(short, long)]
        destination: PathBuf,
    },

    /// List the recognized file formats
    Formats {
        /// Only list formats that can be read
        #[arg(long)]
        readable: bool,
    },
}

/// Compression level names on the command line.
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum LevelArg {
    None,
    Fastest,
    Optimal,
    Smallest,
}

impl From<LevelArg> for CompressionLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::None => CompressionLevel::NoCompression,
            LevelArg::Fastest => CompressionLevel::Fastest,
            LevelArg::Optimal => CompressionLevel::Optimal,
            LevelArg::Smallest => CompressionLevel::SmallestSize,
        }
    }
}

impl Commands {
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Extract {
                scan,
                mips,
                raw,
                force,
                no_dolphin_mips,
                no_arbitrary_mips,
            } => {
                let mut options = scan.options()?;
                options.mips |= *mips;
                options.raw |= *raw;
                options.force |= *force;
                if *no_dolphin_mips {
                    options.dolphin_mip_detection = false;
                }
                if *no_arbitrary_mips {
                    options.arbitrary_mipmap_detection = false;
                }
                extract::execute(scan, &options)
            }
            Commands::Finalize { scan } => finalize::execute(scan, &scan.options()?),
            Commands::Unpack { scan, overwrite } => {
                let options = scan.options()?;
                let overwrite = options.overwrite || *overwrite;
                let options = options.with_overwrite(overwrite);
                unpack::execute(scan, &options)
            }
            Commands::Cut {
                scan,
                patterns,
                overwrite,
            } => {
                let options = scan.options()?;
                let overwrite = options.overwrite || *overwrite;
                cut::execute(scan, patterns, &options.with_overwrite(overwrite))
            }
            Commands::Combine { scan } => combine::execute(scan, &scan.options()?),
            Commands::Identify { files, json } => identify::execute(files, *json),
            Commands::Compress {
                source,
                destination,
                overwrite,
                codec,
                level,
            } => {
                let options = ScanOptions::new().with_overwrite(*overwrite);
                compression::compress(source, destination, codec, (*level).into(), &options)
            }
            Commands::Decompress {
                source,
                destination,
            } => compression::decompress(source, destination),
            Commands::Formats { readable } => {
                formats::execute(*readable);
                Ok(())
            }
        }
    }
}
