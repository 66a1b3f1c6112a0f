const EXPONENTIAL_FORMAT_LEADING_ZERO_THRESHOLD: usize = 5;
const EXPONENTIAL_FORMAT_TRAILING_ZERO_THRESHOLD: usize = 15;
const FMT_MAX_INTEGER_PADDING: usize = 1000;