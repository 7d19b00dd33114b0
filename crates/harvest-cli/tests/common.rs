#![allow(dead_code)]

use std::io::{Cursor, Write};

use assert_cmd::assert::Assert;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use httptest::Server;
use serde_json::{json, Value};

pub fn harvest_cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("harvest");
    cmd.env("HARVEST_PROGRESS", "0")
        .env("HARVEST_KEEP_PROXIES", "0")
        .env("HARVEST_HTTP_ATTEMPTS", "1")
        .env("HARVEST_HTTP_TIMEOUT", "10")
        .env("NO_COLOR", "1");
    cmd
}

/// Point the binary at a local server standing in for the registry and ranking.
pub fn against(server: &Server) -> Command {
    let mut cmd = harvest_cmd();
    cmd.env("HARVEST_REGISTRY_URL", server.url_str("/pypi"))
        .env(
            "HARVEST_RANKING_URL",
            format!("http://{}/top-{{days}}.json", server.addr()),
        );
    cmd
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}

pub fn ranking(names: &[&str]) -> Value {
    let rows: Vec<Value> = names
        .iter()
        .enumerate()
        .map(|(idx, name)| json!({ "project": name, "download_count": 1000 - idx }))
        .collect();
    json!({ "last_update": "2024-06-01 00:00:00", "rows": rows })
}

/// Registry metadata with a single release whose only source archive lives at `url`.
pub fn source_release(version: &str, url: &str) -> Value {
    let files = json!([
        { "python_version": "py3", "url": format!("{url}.whl"), "packagetype": "bdist_wheel" },
        { "python_version": "source", "url": url, "packagetype": "sdist" }
    ]);
    let by_version = releases(version, &files);
    json!({ "info": {}, "urls": files, "releases": by_version })
}

pub fn wheel_only_release(version: &str, url: &str) -> Value {
    let files = json!([{ "python_version": "py3", "url": url }]);
    let by_version = releases(version, &files);
    json!({ "urls": files, "releases": by_version })
}

fn releases(version: &str, files: &Value) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(version.to_string(), files.clone());
    Value::Object(map)
}

pub fn zip_archive(entries: &[(&str, Option<&str>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, contents) in entries {
        match contents {
            Some(text) => {
                writer.start_file(*name, options).expect("start file");
                writer.write_all(text.as_bytes()).expect("write entry");
            }
            None => writer.add_directory(*name, options).expect("add dir"),
        }
    }
    writer.finish().expect("finish zip").into_inner()
}

pub fn tar_gz_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, contents.as_bytes())
            .expect("append");
    }
    let raw = builder.into_inner().expect("finish tar");
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&raw).expect("gzip");
    encoder.finish().expect("gzip finish")
}
