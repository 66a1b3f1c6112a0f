const SERDE_SCALE_LIMIT: i64 = 150000;