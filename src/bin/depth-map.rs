use log::*;
use sgbm_disparity::prelude::*;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "depth-map", about = "Compute a colourised disparity map from a stereo pair")]
struct Opt {
    /// The left image of the rectified pair.
    #[structopt(parse(from_os_str))]
    left: PathBuf,
    /// The right image of the rectified pair.
    #[structopt(parse(from_os_str))]
    right: PathBuf,
    /// Where the colourised disparity map is written.
    #[structopt(short, long, default_value = "depth.png", parse(from_os_str))]
    output: PathBuf,
    /// Matcher parameters in JSON, in the format of `sgbm_disparity::params::Params`.
    ///
    /// Missing fields take their default values.
    #[structopt(short, long, parse(from_os_str))]
    params: Option<PathBuf>,
    /// Also write the normalised grayscale disparity map here.
    #[structopt(long, parse(from_os_str))]
    gray: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();

    let params: Params = match &opt.params {
        Some(path) => {
            let params: Params = serde_json::from_reader(std::fs::File::open(path)?)?;
            info!("loaded parameters from {}", path.display());
            params
        }
        None => {
            info!("using default parameters");
            Params::default()
        }
    };

    let left = image::open(&opt.left)?.to_luma8();
    let right = image::open(&opt.right)?.to_luma8();

    let mut matcher = SemiGlobal::new(params)?;
    let disp_map = matcher.compute(&StereoFrame::new(&left, &right))?;

    match disp_map.valid_range() {
        Some((lo, hi)) => info!("disparities span {}..={}", lo, hi),
        None => warn!("no pixel has a reliable disparity"),
    }

    let levels = disp_map.to_luma_normalised();
    if let Some(path) = &opt.gray {
        levels.save(path)?;
        info!("wrote {}", path.display());
    }

    sgbm_disparity::normalize::colorize(&levels, ColorMap::Jet).save(&opt.output)?;
    info!("wrote {}", opt.output.display());

    Ok(())
}
