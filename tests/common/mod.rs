#![allow(dead_code)]

pub mod tracing_util;

pub mod fixtures {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use base64::Engine as _;
    use brrtdispatch::dispatcher::{Request, Response};
    use brrtdispatch::plugins::Plugin;
    use brrtdispatch::status::StageResult;

    /// `Authorization` header value for HTTP Basic credentials.
    pub fn basic_auth(user: &str, password: &str) -> String {
        let token =
            base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
        format!("Basic {token}")
    }

    /// Counts how often each hook ran.
    #[derive(Default)]
    pub struct StageCounter {
        pub pre: AtomicUsize,
        pub handle: AtomicUsize,
        pub post: AtomicUsize,
    }

    impl StageCounter {
        pub fn counts(&self) -> (usize, usize, usize) {
            (
                self.pre.load(Ordering::SeqCst),
                self.handle.load(Ordering::SeqCst),
                self.post.load(Ordering::SeqCst),
            )
        }
    }

    /// Plugin that only counts, sharing its counter with the test.
    pub struct CountingPlugin(pub Arc<StageCounter>);

    impl Plugin for CountingPlugin {
        fn fixup_request(&self, req: Request) -> StageResult<Request> {
            self.0.pre.fetch_add(1, Ordering::SeqCst);
            Ok(req)
        }

        fn handle_request(&self, _req: &mut Request) -> StageResult<Option<Response>> {
            self.0.handle.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        fn fixup_response(&self, _req: &Request, _res: &mut Response) -> StageResult<()> {
            self.0.post.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

pub mod temp_files {
    use std::io::Write;

    use tempfile::NamedTempFile;

    /// Write `content` to a fresh `.yaml` file removed when the handle drops.
    pub fn create_temp_yaml(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("brrtd_test_")
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }
}
