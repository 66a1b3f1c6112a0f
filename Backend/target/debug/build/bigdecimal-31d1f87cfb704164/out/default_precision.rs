const DEFAULT_PRECISION: u64 = 100;