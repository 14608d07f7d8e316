//! Integration tests for Strata

use std::path::Path;

/// Lay out a two-layer release under `root/releases/1.0`
fn write_mirror(root: &Path) {
    let release = root.join("releases/1.0");
    let files: &[(&str, &str)] = &[
        (
            "release.xml",
            r#"<Release><Branch>
                <Layer uri="app" BaseLayerURIs="base"/>
                <Layer uri="base" BaseLayerURIs=""/>
            </Branch></Release>"#,
        ),
        (
            "app/directory.xml",
            r#"<Directory>
                <Includes><Include FileName="tools/directory.xml"/></Includes>
                <FileGroups><FileGroup>
                    <File Name="layer.xml"/>
                    <File Name="run.sh"/>
                    <File Name="lib/native.so"/>
                    <File Name="res/a.txt"/>
                    <File Name="res/b.txt"/>
                </FileGroup></FileGroups>
            </Directory>"#,
        ),
        ("app/layer.xml", r#"<Layer Name="app" BaseLayerURIs="base" />"#),
        ("app/run.sh", "#!/bin/sh\n"),
        ("app/lib/native.so", "elf"),
        ("app/res/a.txt", "a"),
        ("app/res/b.txt", "b"),
        (
            "app/tools/directory.xml",
            r#"<Directory><FileGroups><FileGroup><File Name="tool.jar"/></FileGroup></FileGroups></Directory>"#,
        ),
        ("app/tools/tool.jar", "jar"),
        (
            "base/directory.xml",
            r#"<Directory><FileGroups><FileGroup>
                <File Name="layer.xml"/>
                <File Name="base.txt"/>
            </FileGroup></FileGroups></Directory>"#,
        ),
        ("base/layer.xml", r#"<Layer Name="base" />"#),
        ("base/base.txt", "base"),
    ];
    for (path, content) in files {
        let path = release.join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

mod cli_tests {
    use super::write_mirror;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// Isolated environment: no user config, cache in a temp dir
    struct Env {
        _temp: TempDir,
        mirror: std::path::PathBuf,
        work: std::path::PathBuf,
        config: std::path::PathBuf,
    }

    impl Env {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let mirror = temp.path().join("mirror");
            write_mirror(&mirror);
            Self {
                mirror,
                work: temp.path().join("work"),
                config: temp.path().join("config.toml"),
                _temp: temp,
            }
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("strata");
            cmd.env("STRATA_CONFIG", &self.config)
                .env("STRATA_REPO", format!("file://{}", self.mirror.display()))
                .env("STRATA_WORK_DIR", &self.work)
                .env("CI", "true");
            cmd
        }
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("strata")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Layer cache consistency engine"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("strata")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("strata"));
    }

    #[test]
    fn config_path() {
        let env = Env::new();
        env.cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let env = Env::new();
        env.cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[repository]"));
    }

    #[test]
    fn config_set_then_show() {
        let env = Env::new();
        env.cmd()
            .args(["config", "set", "pool.width", "3"])
            .assert()
            .success();
        env.cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("width = 3"));
    }

    #[test]
    fn config_set_unknown_key() {
        let env = Env::new();
        env.cmd()
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn check_empty_cache_fails() {
        let env = Env::new();
        env.cmd()
            .args(["check", "1.0", "app"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("incomplete"));
    }

    #[test]
    fn ensure_requires_repository() {
        let env = Env::new();
        env.cmd()
            .env_remove("STRATA_REPO")
            .args(["ensure", "1.0", "app"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No repository configured"));
    }

    #[test]
    fn ensure_rebuilds_then_check_passes() {
        let env = Env::new();
        env.cmd()
            .args(["ensure", "1.0", "app"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Layer cache rebuilt"));

        env.cmd()
            .args(["check", "1.0", "app", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"complete\": true"));

        env.cmd()
            .args(["ensure", "1.0", "app"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Layer cache is complete"));
    }

    #[cfg(unix)]
    #[test]
    fn ensure_runs_command_in_release_dir() {
        let env = Env::new();
        env.cmd()
            .args(["ensure", "1.0", "app", "--", "sh", "-c", "touch ran"])
            .assert()
            .success();

        let marker = std::fs::read_dir(env.work.join("releases"))
            .unwrap()
            .map(|e| e.unwrap().path().join("1.0/ran"))
            .any(|p| p.exists());
        assert!(marker);
    }

    #[test]
    fn layers_lists_chain() {
        let env = Env::new();
        env.cmd()
            .args(["layers", "1.0", "app"])
            .assert()
            .success()
            .stdout(predicate::str::contains("app").and(predicate::str::contains("base")));
    }

    #[test]
    fn unknown_layer_is_not_ready() {
        let env = Env::new();
        env.cmd()
            .args(["ensure", "1.0", "missing"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("could not be resolved"));
    }
}

mod engine_tests {
    use super::write_mirror;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use strata::cache::{CacheEngine, EnsureOutcome, NoProgress, WorkerPool};
    use strata::layer::ReleaseLayerResolver;
    use strata::release::Release;
    use strata::task::TaskQueue;
    use strata::transport::{ExportDepth, LocalTransport, Transport};
    use strata::StrataResult;
    use tempfile::TempDir;

    /// Counts exports made through a local mirror
    #[derive(Default)]
    struct Counting {
        inner: LocalTransport,
        exports: AtomicUsize,
    }

    #[async_trait]
    impl Transport for Counting {
        async fn check_connection(&self, url: &str) -> StrataResult<()> {
            self.inner.check_connection(url).await
        }

        async fn export(&self, url: &str, dest: &Path, depth: ExportDepth) -> StrataResult<()> {
            self.exports.fetch_add(1, Ordering::SeqCst);
            self.inner.export(url, dest, depth).await
        }

        async fn read_to_string(&self, url: &str) -> StrataResult<String> {
            self.inner.read_to_string(url).await
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    struct Setup {
        _temp: TempDir,
        release: Release,
        transport: Arc<Counting>,
        engine: Arc<CacheEngine>,
    }

    fn setup(width: usize) -> Setup {
        let temp = TempDir::new().unwrap();
        let mirror = temp.path().join("mirror");
        write_mirror(&mirror);
        let release = Release::new(
            format!("file://{}", mirror.display()),
            "1.0",
            temp.path().join("work"),
        )
        .unwrap();

        let transport = Arc::new(Counting::default());
        let resolver = Arc::new(ReleaseLayerResolver::new(transport.clone()));
        let engine = CacheEngine::new(transport.clone(), resolver, Arc::new(TaskQueue::start()))
            .with_pool(WorkerPool::new(width));

        Setup {
            _temp: temp,
            release,
            transport,
            engine: Arc::new(engine),
        }
    }

    #[tokio::test]
    async fn second_check_is_network_free() {
        let s = setup(5);

        let first = s
            .engine
            .ensure_cache(&s.release, "app", Vec::new(), &NoProgress)
            .await
            .unwrap();
        assert!(matches!(first, EnsureOutcome::Ready { rebuilt: true, .. }));
        let after_rebuild = s.transport.exports.load(Ordering::SeqCst);
        assert!(after_rebuild > 0);

        let second = s
            .engine
            .ensure_cache(&s.release, "app", Vec::new(), &NoProgress)
            .await
            .unwrap();
        assert_eq!(second, EnsureOutcome::Ready { rebuilt: false, exported: 0 });
        assert_eq!(s.transport.exports.load(Ordering::SeqCst), after_rebuild);
    }

    #[tokio::test]
    async fn every_indexed_path_exists() {
        let s = setup(1);
        s.engine
            .ensure_cache(&s.release, "app", Vec::new(), &NoProgress)
            .await
            .unwrap();

        let root = s.release.local_root();
        for layer in ["app", "base"] {
            let index = std::fs::read_to_string(root.join(layer).join(".layer.index")).unwrap();
            assert!(!index.is_empty());
            for path in index.lines() {
                assert!(root.join(path).exists(), "{} missing", path);
            }
        }
    }

    #[tokio::test]
    async fn parallel_checks_share_one_rebuild() {
        let s = setup(2);
        let mut handles = Vec::new();
        for _ in 0..4 {
            let engine = Arc::clone(&s.engine);
            let release = s.release.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .ensure_cache(&release, "app", Vec::new(), &NoProgress)
                    .await
            }));
        }

        let mut rebuilt = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                EnsureOutcome::Ready { rebuilt: true, .. } => rebuilt += 1,
                EnsureOutcome::Ready { rebuilt: false, .. } => {}
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        assert_eq!(rebuilt, 1);
    }
}
