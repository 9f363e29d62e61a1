// Copyright (c) 2026 Bountyy Oy. All rights reserved.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use courier::http::RequestBuilder;
use courier::{
    set_value_xml_tag, CallRecord, ConnectionConfig, CookieJar, Headers, Method, Request,
    RequestDefaults, StatsAggregator,
};
use serde_json::json;

fn request_build_benchmark(c: &mut Criterion) {
    let config = ConnectionConfig::new("example.com");
    let defaults = RequestDefaults::default();
    let headers = Headers::new().with("Accept", "application/json");
    let mut cookies = CookieJar::new();
    cookies.set("/", "sid", "abc");
    cookies.set("/api", "lang", "en");

    let rows: Vec<_> = (0..50)
        .map(|i| json!({"name": format!("user{}", i), "job": "none", "address": {"city": "x"}}))
        .collect();
    let request = Request::new("/api/users")
        .data(json!(rows))
        .values_for(json!({"job": "tester", "city": "Espoo"}));

    c.bench_function("build_json_array_with_values_for", |b| {
        b.iter(|| {
            let builder = RequestBuilder::new(&config, &defaults, &headers, &cookies);
            black_box(builder.build(Method::Post, &request).ok())
        })
    });
}

fn xml_substitution_benchmark(c: &mut Criterion) {
    let xml: String = (0..200)
        .map(|i| format!("<ns:item><ns:id>{}</ns:id><ns:name>n</ns:name></ns:item>", i))
        .collect();

    c.bench_function("set_value_xml_tag", |b| {
        b.iter(|| black_box(set_value_xml_tag("name", &xml, "peter", true)))
    });
}

fn stats_record_benchmark(c: &mut Criterion) {
    let stats = StatsAggregator::new();
    let now = Utc::now();
    let call = CallRecord {
        server: "example.com:80".to_string(),
        path: "/api/users".to_string(),
        method: "GET".to_string(),
        code: 200,
        name: Some("list users".to_string()),
        started: now,
        finished: now,
        elapsed: 0.01,
    };

    c.bench_function("stats_record", |b| b.iter(|| stats.record(black_box(&call))));
}

criterion_group!(
    benches,
    request_build_benchmark,
    xml_substitution_benchmark,
    stats_record_benchmark
);
criterion_main!(benches);
