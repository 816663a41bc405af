pub fn default_enabled() -> bool {
    true
}

pub fn default_order_book_slots() -> usize {
    8
}

pub fn default_depth_levels() -> usize {
    50
}

pub fn default_max_rise_bps() -> u64 {
    500
}

pub fn default_max_drop_bps() -> u64 {
    500
}

pub fn default_min_band_width() -> u64 {
    100
}

pub fn default_max_band_width() -> u64 {
    1_000
}
