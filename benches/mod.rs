use criterion::{criterion_group, criterion_main};


criterion_group!(
    benches,
    location::cloud_locate::bench_parse_location,
    location::cloud_locate::bench_string_to_fixed,
    location::cloud_locate::bench_locate_round_trip,
    location::service::bench_continuous_gnss_completion,
    location::service::bench_start_and_complete
);
criterion_main!(benches);
