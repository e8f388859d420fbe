//! Single-file extraction benches, one per supported language, mirroring
//! `rpg-parser/benches/parsing.rs`'s per-language extraction benches. The
//! teacher also benches `parse_files_parallel`; this crate has no
//! rayon-backed parallel-parsing entry point, so that bench has no
//! counterpart here.

use codegraph_parser::parse_file;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const PYTHON_SAMPLE: &str = r#"
import os
from collections import defaultdict

class Repository:
    def __init__(self, root):
        self.root = root
        self.cache = defaultdict(list)

    def scan(self):
        for entry in os.listdir(self.root):
            self._index(entry)
        return self.cache

    def _index(self, entry):
        self.cache[entry[0]].append(entry)


def load_repository(path):
    repo = Repository(path)
    repo.scan()
    return repo


def main():
    repo = load_repository(".")
    print(repo.cache)
"#;

const JAVASCRIPT_SAMPLE: &str = r#"
import { readFile } from 'fs/promises';

class Repository {
    constructor(root) {
        this.root = root;
        this.cache = new Map();
    }

    async scan(entries) {
        for (const entry of entries) {
            this.index(entry);
        }
        return this.cache;
    }

    index(entry) {
        const bucket = this.cache.get(entry[0]) || [];
        bucket.push(entry);
        this.cache.set(entry[0], bucket);
    }
}

export async function loadRepository(path, entries) {
    const repo = new Repository(path);
    await repo.scan(entries);
    return repo;
}

export function main() {
    loadRepository('.', []);
}
"#;

const TYPESCRIPT_SAMPLE: &str = r#"
interface Entry {
    name: string;
    kind: string;
}

class Repository {
    private cache: Map<string, Entry[]> = new Map();

    constructor(private root: string) {}

    scan(entries: Entry[]): Map<string, Entry[]> {
        for (const entry of entries) {
            this.index(entry);
        }
        return this.cache;
    }

    private index(entry: Entry): void {
        const bucket = this.cache.get(entry.kind) ?? [];
        bucket.push(entry);
        this.cache.set(entry.kind, bucket);
    }
}

function loadRepository(path: string, entries: Entry[]): Repository {
    const repo = new Repository(path);
    repo.scan(entries);
    return repo;
}
"#;

const JAVA_SAMPLE: &str = r#"
package com.example.repo;

import java.util.List;
import java.util.ArrayList;

public class Repository {
    private String root;
    private List<String> cache;

    public Repository(String root) {
        this.root = root;
        this.cache = new ArrayList<>();
    }

    public List<String> scan(List<String> entries) {
        for (String entry : entries) {
            index(entry);
        }
        return cache;
    }

    private void index(String entry) {
        cache.add(entry);
    }

    public static Repository loadRepository(String path, List<String> entries) {
        Repository repo = new Repository(path);
        repo.scan(entries);
        return repo;
    }
}
"#;

fn bench_python_extraction(c: &mut Criterion) {
    c.bench_function("parse_file_python", |b| {
        b.iter(|| {
            let output = parse_file("repo.py", black_box(PYTHON_SAMPLE), "P", None);
            black_box(output.result.entities.len());
        });
    });
}

fn bench_javascript_extraction(c: &mut Criterion) {
    c.bench_function("parse_file_javascript", |b| {
        b.iter(|| {
            let output = parse_file("repo.js", black_box(JAVASCRIPT_SAMPLE), "P", None);
            black_box(output.result.entities.len());
        });
    });
}

fn bench_typescript_extraction(c: &mut Criterion) {
    c.bench_function("parse_file_typescript", |b| {
        b.iter(|| {
            let output = parse_file("repo.ts", black_box(TYPESCRIPT_SAMPLE), "P", None);
            black_box(output.result.entities.len());
        });
    });
}

fn bench_java_extraction(c: &mut Criterion) {
    c.bench_function("parse_file_java", |b| {
        b.iter(|| {
            let output = parse_file("Repository.java", black_box(JAVA_SAMPLE), "P", None);
            black_box(output.result.entities.len());
        });
    });
}

criterion_group!(
    benches,
    bench_python_extraction,
    bench_javascript_extraction,
    bench_typescript_extraction,
    bench_java_extraction
);
criterion_main!(benches);
