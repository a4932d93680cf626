pub const DELIMITER: char = '\t';

pub const BED_FILE_EXTENSION: &str = "bed";
pub const GZ_FILE_EXTENSION: &str = "gz";
