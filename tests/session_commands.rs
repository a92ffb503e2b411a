// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Session commands against an in-process engine

use std::sync::Arc;

use cflbridge::bridge::{ArgumentVector, CommandEngine, Transcript};
use cflbridge::config::{load_config, BridgeConfig};
use cflbridge::prelude::*;
use ndarray::{s, ArrayD, Ix2, IxDyn, ShapeBuilder};
use parking_lot::Mutex;
use tempfile::tempdir;

/// Small command set: `cabs`, `conj` (in place), `version`, `noop`
struct ToyEngine {
    registry: Arc<Registry>,
    /// Tokens of every call, with whether each token was registered mid-call
    seen: Mutex<Vec<Vec<(String, bool)>>>,
}

impl ToyEngine {
    fn new(registry: Arc<Registry>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn cabs(&self, input: &str, output: &str) -> i32 {
        let Ok(dims) = self.registry.dims_of(input) else {
            return 1;
        };
        let Ok(view) = self.registry.load(input, &dims) else {
            return 1;
        };
        let source = view.to_elements();
        self.registry.unmap(view);
        let written = self.registry.create_with(output, dims, |target| {
            for (t, s) in target.iter_mut().zip(&source) {
                *t = ComplexF32::from(s.norm());
            }
        });
        i32::from(written.is_err())
    }

    fn conj_in_place(&self, name: &str) -> i32 {
        let Ok(dims) = self.registry.dims_of(name) else {
            return 1;
        };
        let Ok(view) = self.registry.load(name, &dims) else {
            return 1;
        };
        let data = view.as_ptr() as *mut ComplexF32;
        for i in 0..view.byte_size() / 8 {
            unsafe { (*data.add(i)).im = -(*data.add(i)).im };
        }
        self.registry.unmap(view);
        0
    }
}

impl CommandEngine for ToyEngine {
    fn execute(&self, argv: &ArgumentVector, transcript: Option<&mut Transcript>) -> i32 {
        let tokens = argv.to_strings();
        self.seen.lock().push(
            tokens
                .iter()
                .map(|t| (t.clone(), self.registry.exists(t)))
                .collect(),
        );
        match tokens.first().map(String::as_str) {
            Some("cabs") if tokens.len() == 3 => self.cabs(&tokens[1], &tokens[2]),
            Some("version") => {
                if let Some(t) = transcript {
                    t.push_str("  v0.9.00  \nbuilt with fft\n");
                }
                0
            }
            Some("conj") if tokens.len() == 2 => self.conj_in_place(&tokens[1]),
            Some("noop") => 0,
            _ => {
                if let Some(t) = transcript {
                    t.push_str("boom\n");
                }
                3
            }
        }
    }
}

fn session() -> (Session, Arc<ToyEngine>) {
    let registry = Arc::new(Registry::default());
    let engine = ToyEngine::new(registry.clone());
    let session = Session::with_engine(registry, engine.clone(), &BridgeConfig::default());
    (session, engine)
}

fn ramp(shape: &[usize]) -> ArrayD<ComplexF32> {
    let n: usize = shape.iter().product();
    let values: Vec<ComplexF32> = (0..n)
        .map(|i| ComplexF32::new(i as f32, -(i as f32) * 2.0))
        .collect();
    ArrayD::from_shape_vec(IxDyn(shape), values).unwrap()
}

#[test]
fn run_returns_engine_output_in_logical_order() {
    let (session, engine) = session();
    let input = ramp(&[3, 4]);

    let result = session.run(&["cabs".into(), (&input).into()]).unwrap();

    assert_eq!(result.shape(), input.shape());
    for (out, inp) in result.iter().zip(input.iter()) {
        assert_eq!(out.re, inp.norm());
        assert_eq!(out.im, 0.0);
    }

    // both temporaries existed during the call and are gone now
    let calls = engine.seen.lock();
    assert_eq!(calls.len(), 1);
    assert!(calls[0][1].1);
    assert!(calls[0][1].0.ends_with(".mem"));
    assert!(!calls[0][2].1);
    assert!(session.registry().is_empty());
}

#[test]
fn strided_views_are_copied_before_the_call() {
    let (session, _engine) = session();
    let base = ramp(&[4, 6]).into_dimensionality::<Ix2>().unwrap();
    let strided = base.slice(s![.., ..;2]).into_dyn();

    let result = session.run(&["cabs".into(), strided.clone().into()]).unwrap();

    assert_eq!(result.shape(), &[4, 3]);
    for (out, inp) in result.iter().zip(strided.iter()) {
        assert_eq!(out.re, inp.norm());
    }
}

#[test]
fn read_returns_trimmed_first_line() {
    let (session, _engine) = session();
    assert_eq!(session.read(&["version".into()]).unwrap(), "v0.9.00");
}

#[test]
fn scalar_arguments_are_rendered_as_tokens() {
    let (session, engine) = session();
    session
        .execute(&["noop".into(), 3.into(), 0.25f64.into(), "-u".into()])
        .unwrap();

    let calls = engine.seen.lock();
    let tokens: Vec<&str> = calls[0].iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(tokens, vec!["noop", "3", "0.25", "-u"]);
}

#[test]
fn non_zero_status_is_unsuccessful_and_cleans_up() {
    let (session, _engine) = session();
    let input = ramp(&[2, 2]);

    let err = session
        .read(&["fft".into(), (&input).into()])
        .unwrap_err();
    match err {
        SessionError::Unsuccessful { status, transcript } => {
            assert_eq!(status, 3);
            assert_eq!(transcript.as_deref(), Some("boom\n"));
        }
        other => panic!("expected Unsuccessful, got {other:?}"),
    }
    assert!(session.registry().is_empty());
}

#[test]
fn missing_output_is_fatal() {
    let (session, _engine) = session();
    let input = ramp(&[2]);

    let err = session.run(&["noop".into(), (&input).into()]).unwrap_err();
    assert!(matches!(err, SessionError::Fatal { .. }));
    assert!(session.registry().is_empty());
    assert!(session.registry().names().is_empty());
}

#[test]
fn configured_session_uses_suffix_and_reports_missing_engine() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cflbridge.toml");
    std::fs::write(
        &path,
        "[storage]\nrequired_suffix = \".tmp\"\n\n[transcript]\ncapacity = 32\n",
    )
    .unwrap();
    let config = load_config(Some(path.as_path()), None).unwrap();
    let session = Session::from_config(&config).unwrap();
    assert_eq!(session.bridge().transcript_capacity(), 32);

    // No library configured: commands run against the unavailable engine
    let err = session.execute(&["version".into()]).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Unsuccessful { status, .. }
            if status == cflbridge::bridge::ENGINE_UNAVAILABLE_STATUS
    ));

    let engine = ToyEngine::new(session.registry().clone());
    session.bridge().set_engine(engine.clone());
    let input = ramp(&[2]);
    session.run(&["cabs".into(), (&input).into()]).unwrap();

    let calls = engine.seen.lock();
    assert!(calls[0][1].0.ends_with(".tmp"));
    assert!(calls[0][2].0.ends_with(".tmp"));
}

#[test]
fn in_out_arrays_are_updated_in_place() {
    let (session, _engine) = session();
    let values: Vec<ComplexF32> = (0..6)
        .map(|i| ComplexF32::new(i as f32, 1.0 + i as f32))
        .collect();
    let mut host = ArrayD::from_shape_vec(IxDyn(&[2, 3]).f(), values).unwrap();
    let before = host.clone();

    session.execute(&["conj".into(), (&mut host).into()]).unwrap();

    for (after, orig) in host.iter().zip(before.iter()) {
        assert_eq!(after.re, orig.re);
        assert_eq!(after.im, -orig.im);
    }
    assert!(session.registry().is_empty());
}

#[test]
fn row_major_in_out_arrays_are_refused() {
    let (session, engine) = session();
    let mut host = ramp(&[2, 3]);

    let err = session
        .execute(&["conj".into(), (&mut host).into()])
        .unwrap_err();

    assert!(matches!(err, SessionError::Fatal { .. }));
    assert!(engine.seen.lock().is_empty());
    assert!(session.registry().is_empty());
    assert_eq!(host, ramp(&[2, 3]));
}
