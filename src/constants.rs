use h3o::Resolution;

// Grid resolutions the balance map supports (coarse -> fine)
pub const SUPPORTED_RESOLUTIONS: [Resolution; 3] =
    [Resolution::Six, Resolution::Seven, Resolution::Eight];
pub const DEFAULT_RESOLUTION: u8 = 7;

// Diffusion reach in rings; ring 0 is the source cell itself
pub const MIN_RADIUS: u32 = 1;
pub const MAX_RADIUS: u32 = 16;
pub const DEFAULT_RADIUS_DEMAND: u32 = 6;
pub const DEFAULT_RADIUS_SUPPLY: u32 = 6;

pub const MIN_DECAY_EXPONENT: u32 = 1;
pub const MAX_DECAY_EXPONENT: u32 = 8;
pub const DEFAULT_DECAY_EXPONENT_DEMAND: u32 = 2;
pub const DEFAULT_DECAY_EXPONENT_SUPPLY: u32 = 1;

pub const DEFAULT_DELIMITER: u8 = b';';

// SBB passenger frequency table (passagierfrequenz.csv)
pub const COL_GEOPOSITION: &str = "Geoposition";
pub const COL_DAILY_TRAFFIC: &str = "DTV";
pub const COL_CANTON: &str = "Kanton";
pub const COL_STATION_CODE: &str = "code";
pub const COL_STATION_NAME: &str = "Bahnhof_Haltestelle";

// SBB mobility table (mobilitat.csv)
pub const COL_PARK_AND_RIDE: &str = "parkrail_anzahl";
pub const COL_BIKE_SHARE: &str = "mietvelo_anzahl";
pub const COL_STATION_ABBREVIATION: &str = "Abkuerzung Bahnhof";
pub const COL_STOP_NAME: &str = "Name Haltestelle";
