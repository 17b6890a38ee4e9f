//! End-to-end tests of the hiercc-solver command line.
//!
//! Each test writes small Enterobase-style reference tables and a
//! chewBBACA-style query table into a temporary directory and runs the binary.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const BIN: &str = "hiercc-solver";

const PROFILES: &str = "ST\tl1\tl2\n1\tA\tB\n2\tA\tC\n3\tX\tY\n";
const HIERCC: &str = "ST\tHC0\tHC400 (cgST Cplx)\n1\t1\t1\n2\t2\t1\n3\t3\t3\n";

const OUTPUT_HEADER: &str =
    "isolate_name\tmatching_alleles\tmax_mismatches\tconfidence_level\tnr_loci\tST\tHC0\tHC400 (cgST Cplx)";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        ws.write("profiles.list", PROFILES);
        ws.write("hiercc.tsv", HIERCC);
        ws
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).unwrap()
    }

    fn precluster(&self, output: &str) {
        Command::cargo_bin(BIN)
            .unwrap()
            .arg("precluster")
            .arg("--profiles")
            .arg(self.path("profiles.list"))
            .arg("--hiercc")
            .arg(self.path("hiercc.tsv"))
            .arg("--output")
            .arg(self.path(output))
            .assert()
            .success();
    }

    fn resolve(&self, queries: &Path, hiercc: &Path, output: &str) -> Command {
        let mut cmd = Command::cargo_bin(BIN).unwrap();
        cmd.arg("resolve")
            .arg("--input")
            .arg(queries)
            .arg("--hiercc")
            .arg(hiercc)
            .arg("--output")
            .arg(self.path(output));
        cmd
    }
}

fn lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

#[test]
fn test_no_args_fails() {
    Command::cargo_bin(BIN).unwrap().assert().failure();
}

#[test]
fn test_resolve_requires_reference() {
    let ws = Workspace::new();
    let queries = ws.write("results_alleles.tsv", "FILE\tl1.fasta\tl2.fasta\ns.fasta\tA\tB\n");
    ws.resolve(&queries, &ws.path("hiercc.tsv"), "out.tsv")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--index"));
}

#[test]
fn test_exact_match_selects_st() {
    let ws = Workspace::new();
    ws.precluster("index");
    let queries = ws.write(
        "results_alleles.tsv",
        "FILE\tl1.fasta\tl2.fasta\nsample1.fasta\tA\tB\n",
    );

    ws.resolve(&queries, &ws.path("hiercc.tsv"), "out.tsv")
        .arg("--index")
        .arg(ws.path("index"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolved 1 isolate(s), 0 failed"));

    assert_eq!(
        lines(&ws.read("out.tsv")),
        vec![OUTPUT_HEADER, "sample1\t2\t0\tHC20\t2\t1\t1\t1"]
    );
    assert!(!ws.path("out.tsv.errors.tsv").exists());
}

#[test]
fn test_tie_goes_to_first_st() {
    let ws = Workspace::new();
    ws.precluster("index");
    let queries = ws.write(
        "results_alleles.tsv",
        "FILE\tl1.fasta\tl2.fasta\nsample2.fasta\tA\tZ\n",
    );

    ws.resolve(&queries, &ws.path("hiercc.tsv"), "out.tsv")
        .arg("--index")
        .arg(ws.path("index"))
        .assert()
        .success();

    assert_eq!(
        lines(&ws.read("out.tsv")),
        vec![OUTPUT_HEADER, "sample2\t1\t1\tHC20\t2\t1\t1\t1"]
    );
}

#[test]
fn test_unresolved_st_is_reported_and_run_continues() {
    let ws = Workspace::new();
    ws.precluster("index");
    // Same release except ST 2 is absent
    let partial = ws.write(
        "hiercc_partial.tsv",
        "ST\tHC0\tHC400 (cgST Cplx)\n1\t1\t1\n3\t3\t3\n",
    );
    let queries = ws.write(
        "results_alleles.tsv",
        "FILE\tl1.fasta\tl2.fasta\nfirst.fasta\tA\tC\nsecond.fasta\tX\tY\n",
    );

    ws.resolve(&queries, &partial, "out.tsv")
        .arg("--index")
        .arg(ws.path("index"))
        .assert()
        .success()
        .stdout(predicate::str::contains("1 failed"))
        .stderr(predicate::str::contains("ST 2 is not in the hierCC table"));

    assert_eq!(
        lines(&ws.read("out.tsv")),
        vec![OUTPUT_HEADER, "second\t2\t0\tHC20\t2\t3\t3\t3"]
    );
    let errors = ws.read("out.tsv.errors.tsv");
    assert!(errors.starts_with("isolate_name\tstage\terror_kind\tmessage\n"));
    assert!(errors.contains("first\tlookup_hiercc\tunresolved_st\t"));
}

#[test]
fn test_confidence_level_from_mismatches() {
    let ws = Workspace::new();
    let nr_loci = 1100;
    let loci: Vec<String> = (1..=nr_loci).map(|i| format!("locus{i}")).collect();

    let mut profiles = format!("ST\t{}\n", loci.join("\t"));
    profiles.push_str(&format!("1\t{}\n", vec!["1"; nr_loci].join("\t")));
    profiles.push_str(&format!("2\t{}\n", vec!["9"; nr_loci].join("\t")));
    ws.write("profiles.list", &profiles);
    ws.write("hiercc.tsv", "ST\tHC0\tHC400\n1\t1\t1\n2\t2\t2\n");

    let columns: Vec<String> = loci.iter().map(|l| format!("{l}.fasta")).collect();
    let calls: Vec<&str> = (0..nr_loci).map(|i| if i < 1050 { "1" } else { "5" }).collect();
    let queries = ws.write(
        "results_alleles.tsv",
        &format!("FILE\t{}\nsample.fasta\t{}\n", columns.join("\t"), calls.join("\t")),
    );

    ws.precluster("index");
    ws.resolve(&queries, &ws.path("hiercc.tsv"), "out.csv")
        .arg("--index")
        .arg(ws.path("index"))
        .assert()
        .success();

    assert_eq!(
        lines(&ws.read("out.csv")),
        vec![
            "isolate_name,matching_alleles,max_mismatches,confidence_level,nr_loci,ST,HC0,HC400",
            "sample,1050,50,HC50,1100,1,1,1"
        ]
    );
}

#[test]
fn test_exhaustive_mode_matches_index_mode() {
    let ws = Workspace::new();
    ws.precluster("index");
    let queries = ws.write(
        "results_alleles.tsv",
        "FILE\tl2.fasta\tl1.fasta\na.fasta\tB\tA\nb.fasta\tZ\tA\nc.fasta\tY\tX\n",
    );

    ws.resolve(&queries, &ws.path("hiercc.tsv"), "indexed.tsv")
        .arg("--index")
        .arg(ws.path("index"))
        .assert()
        .success();
    ws.resolve(&queries, &ws.path("hiercc.tsv"), "exhaustive.tsv")
        .arg("--profiles")
        .arg(ws.path("profiles.list"))
        .arg("--batch-size")
        .arg("1")
        .assert()
        .success();

    assert_eq!(ws.read("indexed.tsv"), ws.read("exhaustive.tsv"));
}

#[test]
fn test_missing_query_locus_is_fatal() {
    let ws = Workspace::new();
    ws.precluster("index");
    let queries = ws.write("results_alleles.tsv", "FILE\tl1.fasta\ns.fasta\tA\n");

    ws.resolve(&queries, &ws.path("hiercc.tsv"), "out.tsv")
        .arg("--index")
        .arg(ws.path("index"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("l2.fasta"));
    assert!(!ws.path("out.tsv").exists());
}

#[test]
fn test_missing_calls_never_match() {
    let ws = Workspace::new();
    ws.write("profiles.list", "ST\tl1\tl2\n1\tLNF\tB\n2\tA\tB\n");
    ws.write("hiercc.tsv", "ST\tHC0\tHC400\n1\t1\t1\n2\t2\t1\n");
    ws.precluster("index");
    let queries = ws.write(
        "results_alleles.tsv",
        "FILE\tl1.fasta\tl2.fasta\ns.fasta\tLNF\tB\n",
    );

    ws.resolve(&queries, &ws.path("hiercc.tsv"), "out.tsv")
        .arg("--index")
        .arg(ws.path("index"))
        .assert()
        .success();

    // Both STs share only l2; the shared LNF call earns nothing
    assert_eq!(lines(&ws.read("out.tsv"))[1], "s\t1\t1\tHC20\t2\t1\t1\t1");
}

#[test]
fn test_gzipped_reference_tables() {
    let ws = Workspace::new();
    let gz = ws.path("profiles.list.gz");
    let mut encoder =
        flate2::write::GzEncoder::new(fs::File::create(&gz).unwrap(), flate2::Compression::default());
    encoder.write_all(PROFILES.as_bytes()).unwrap();
    encoder.finish().unwrap();

    Command::cargo_bin(BIN)
        .unwrap()
        .arg("precluster")
        .arg("--profiles")
        .arg(&gz)
        .arg("--hiercc")
        .arg(ws.path("hiercc.tsv"))
        .arg("--output")
        .arg(ws.path("index"))
        .assert()
        .success();

    assert_eq!(ws.read("index/HC400_1.tsv"), "ST\tl1\tl2\n1\tA\tB\n2\tA\tC\n");
}

#[test]
fn test_precluster_is_idempotent() {
    let ws = Workspace::new();
    ws.precluster("first");
    ws.precluster("second");

    for name in ["manifest.json", "representatives.tsv", "HC400_1.tsv", "HC400_3.tsv"] {
        assert_eq!(
            fs::read(ws.path("first").join(name)).unwrap(),
            fs::read(ws.path("second").join(name)).unwrap(),
            "{name} differs"
        );
    }
    assert_eq!(
        ws.read("first/representatives.tsv"),
        "HC400\tST\tl1\tl2\n1\t1\tA\tB\n3\t3\tX\tY\n"
    );
}

#[test]
fn test_precluster_refuses_existing_output() {
    let ws = Workspace::new();
    ws.precluster("index");

    Command::cargo_bin(BIN)
        .unwrap()
        .arg("precluster")
        .arg("--profiles")
        .arg(ws.path("profiles.list"))
        .arg("--hiercc")
        .arg(ws.path("hiercc.tsv"))
        .arg("--output")
        .arg(ws.path("index"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_precluster_unknown_level() {
    let ws = Workspace::new();
    Command::cargo_bin(BIN)
        .unwrap()
        .arg("precluster")
        .arg("--profiles")
        .arg(ws.path("profiles.list"))
        .arg("--hiercc")
        .arg(ws.path("hiercc.tsv"))
        .arg("--output")
        .arg(ws.path("index"))
        .arg("--level")
        .arg("HC2000")
        .assert()
        .failure()
        .stderr(predicate::str::contains("HC2000"));
    assert!(!ws.path("index").exists());
}

#[test]
fn test_index_info_json() {
    let ws = Workspace::new();
    ws.precluster("index");

    Command::cargo_bin(BIN)
        .unwrap()
        .arg("index")
        .arg(ws.path("index"))
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cluster_level\": \"HC400\""))
        .stdout(predicate::str::contains("\"shards\": 2"));
}

#[test]
fn test_resolve_json_report() {
    let ws = Workspace::new();
    ws.precluster("index");
    let queries = ws.write(
        "results_alleles.tsv",
        "FILE\tl1.fasta\tl2.fasta\nsample1.fasta\tA\tB\n",
    );

    let output = ws
        .resolve(&queries, &ws.path("hiercc.tsv"), "out.tsv")
        .arg("--index")
        .arg(ws.path("index"))
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let verdict = &report["verdicts"][0];
    assert_eq!(verdict["isolate_name"], "sample1");
    assert_eq!(verdict["selected_st"], "1");
    assert_eq!(verdict["confidence_level"], "HC20");
    assert_eq!(verdict["cluster"]["value"], "1");
    assert_eq!(verdict["hiercc"]["HC400 (cgST Cplx)"], "1");
}
