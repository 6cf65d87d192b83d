use std::path::PathBuf;

use anyhow::Result;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use tracesim::{
    catalogue::CatalogueError,
    fov::FovError,
    spectrum::TransmissionCurve,
    Builder, CountUnit, DetectorGeometry, DetectorRegion, Effect, EffectList, ExpectedUnits,
    FovDiagnostic, FromBuilder, InstrumentMode, Observation, ObservationConfig, SkyBox,
    SourceField, Spectrum, TraceCatalogue, TraceSimError, WaveUnit,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn data(file: &str) -> PathBuf {
    [env!("CARGO_MANIFEST_DIR"), "tests", "data", file]
        .iter()
        .collect()
}

// 1 arcsec/mm plate scale on a 16x16 detector of 0.5mm pixels
fn spectrograph() -> ObservationConfig {
    ObservationConfig {
        plate_scale: 1.,
        pixel_scale: 0.5,
        ..Default::default()
    }
}

fn two_orders() -> Result<TraceCatalogue> {
    Ok(TraceCatalogue::load(
        data("two_orders.toml"),
        ExpectedUnits::default(),
    )?)
}

fn only(catalogue: &TraceCatalogue, name: &str) -> Result<TraceCatalogue> {
    let trace = catalogue
        .get(name)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("no trace {name}"))?;
    Ok(TraceCatalogue::builder().trace(trace).build()?)
}

fn observation(config: ObservationConfig, catalogue: TraceCatalogue) -> Result<Observation> {
    Ok(Observation::builder()
        .config(config)
        .catalogue(catalogue)
        .detectors(DetectorGeometry::single((8., 8.), 0.5)?)
        .build()?)
}

fn point(x: f64, y: f64, spectrum: Spectrum) -> Result<SourceField> {
    let mut source = SourceField::new();
    let s = source.add_spectrum(spectrum);
    source.point(x, y, s, 1.)?;
    Ok(source)
}

#[test]
fn flat_background() -> Result<()> {
    init();
    let brightness = 3.;
    for p in [1., 0.1, 10.] {
        let config = ObservationConfig {
            mode: InstrumentMode::Imaging,
            plate_scale: p,
            pixel_scale: p,
            ..Default::default()
        };
        let observation = Observation::builder()
            .config(config)
            .detectors(DetectorGeometry::single((16., 16.), 1.)?)
            .build()?;
        let sky = SourceField::uniform_sky(
            Spectrum::Line {
                wave: 1.5,
                flux: brightness,
            },
            1.,
        )?;
        let exposure = observation.observe(&sky)?;
        let expected = brightness * p * p;
        let image = &exposure.images()[0];
        assert_eq!(image.shape(), (16, 16));
        assert!(((image.median() - expected) / expected).abs() < 1e-9);
        for &v in image.data() {
            assert!(
                ((v - expected) / expected).abs() < 1e-9,
                "pixel scale {p}: {v} instead of {expected}"
            );
        }
    }
    Ok(())
}

#[test]
fn point_source_conservation() -> Result<()> {
    init();
    let observation = observation(spectrograph(), two_orders()?)?;
    let source = point(0.2, 0., Spectrum::Flat { photon_flux: 5. })?;
    let exposure = observation.observe(&source)?;
    // order_1 covers 1um, order_2 0.8um
    let expected = 5. * (1. + 0.8);
    assert!((exposure.total_counts() - expected).abs() < 1e-9);
    let summary = exposure.summary();
    assert_eq!(summary.samples_dropped, 0);
    assert_eq!(summary.tiles_rejected, 0);
    assert!(summary.lost_flux().abs() < 1e-9);
    assert!((summary.input_flux - expected).abs() < 1e-9);
    Ok(())
}

#[test]
fn tile_order_independence() -> Result<()> {
    init();
    let observation = observation(spectrograph(), two_orders()?)?;
    let mut source = SourceField::new();
    let sky = source.add_spectrum(Spectrum::Flat { photon_flux: 2. });
    let line = source.add_spectrum(Spectrum::Line {
        wave: 1.7,
        flux: 50.,
    });
    source
        .extended(SkyBox::new(-0.5, 0.5, -0.02, 0.02), sky, 1.)?
        .point(-0.3, 0.01, line, 1.)?;
    let plan = observation.plan(&source)?;
    assert!(plan.len() > 2);
    let projector = observation.projector();
    let (images, _) = projector.project(&plan, &source)?;

    let mut tiles = plan.tiles.clone();
    tiles.shuffle(&mut StdRng::seed_from_u64(7));
    let mut shuffled = projector.blank_images();
    projector.accumulate(&tiles, &source, &mut shuffled)?;

    let scale = images[0].max();
    assert!(scale > 0.);
    for (a, b) in images[0].data().iter().zip(shuffled[0].data()) {
        assert!((a - b).abs() <= 1e-12 * scale);
    }
    Ok(())
}

#[test]
fn tiles_own_every_sample() -> Result<()> {
    init();
    let config = spectrograph();
    let tolerance = config.tiling.drift_tolerance;
    let catalogue = two_orders()?;
    let observation = observation(config, catalogue.clone())?;
    let mut source = SourceField::new();
    let s = source.add_spectrum(Spectrum::Flat { photon_flux: 1. });
    source.extended(SkyBox::new(-0.5, 0.5, -0.02, 0.02), s, 1.)?;
    let plan = observation.plan(&source)?;
    assert!(plan.primary().count() > 0);
    assert!(plan.iter().all(|t| t.drift <= tolerance + 1e-6));

    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..500 {
        let x = rng.gen_range(-0.5..0.5);
        let y = rng.gen_range(-0.02..0.02);
        let wave = rng.gen_range(1.0..2.2);
        for trace in &catalogue {
            let owners = plan
                .covering(x, y, wave)
                .filter(|t| t.trace.as_deref() == Some(trace.name()))
                .count();
            let expected = usize::from(trace.domain().contains_wave(wave));
            assert_eq!(
                owners,
                expected,
                "({x}, {y}, {wave}) owned by {owners} tile(s) of {}",
                trace.name()
            );
        }
    }
    Ok(())
}

#[test]
fn one_primary_owner_across_orders() -> Result<()> {
    init();
    let observation = observation(spectrograph(), two_orders()?)?;
    let mut source = SourceField::new();
    let s = source.add_spectrum(Spectrum::Flat { photon_flux: 1. });
    source.extended(SkyBox::new(-0.5, 0.5, -0.02, 0.02), s, 1.)?;
    let plan = observation.plan(&source)?;
    // order_1 stops at 2um, order_2 carries on up to 2.2um
    let waves = (0..=1200)
        .map(|i| 1. + i as f64 * 1e-3)
        .chain([2., 2.0000000000000004]);
    for wave in waves {
        let owners: Vec<_> = plan
            .primary()
            .filter(|t| t.covers(0.1, 0., wave))
            .map(|t| t.trace.as_deref())
            .collect();
        let expected = if wave <= 2. { "order_1" } else { "order_2" };
        assert_eq!(owners, vec![Some(expected)], "wave {wave}");
    }
    Ok(())
}

#[test]
fn stacked_detectors() -> Result<()> {
    init();
    // order_1 disperses along y across the seam of the two detectors
    let detectors = DetectorGeometry::new(vec![
        DetectorRegion::new(1, (0., -2.), (8., 4.), 0.5),
        DetectorRegion::new(2, (0., 2.), (8., 4.), 0.5),
    ])?;
    let observation = Observation::builder()
        .config(spectrograph())
        .catalogue(only(&two_orders()?, "order_1")?)
        .detectors(detectors)
        .build()?;
    let source = point(0.2, 0., Spectrum::Flat { photon_flux: 5. })?;
    let plan = observation.plan(&source)?;
    assert!(plan.iter().any(|t| t.detector_id == 1));
    assert!(plan.iter().any(|t| t.detector_id == 2));
    for i in 0..=100 {
        let wave = 1. + i as f64 * 1e-2;
        assert_eq!(
            plan.primary().filter(|t| t.covers(0.2, 0., wave)).count(),
            1,
            "wave {wave}"
        );
    }
    let exposure = observation.observe_plan(plan, &source)?;
    let summary = exposure.summary();
    assert!(exposure.image(1).map_or(0., |i| i.sum()) > 0.);
    assert!(exposure.image(2).map_or(0., |i| i.sum()) > 0.);
    assert!((exposure.total_counts() - 5.).abs() < 1e-9);
    assert!((summary.input_flux - 5.).abs() < 1e-9);
    assert!(summary.lost_flux().abs() < 1e-9);
    Ok(())
}

#[test]
fn catalogue_units_against_config() -> Result<()> {
    init();
    let nm = ExpectedUnits {
        wave: WaveUnit::Nanometer,
        ..Default::default()
    };
    let catalogue = TraceCatalogue::load(data("nm_units.toml"), nm)?;
    let result = Observation::builder()
        .config(spectrograph())
        .catalogue(catalogue.clone())
        .detectors(DetectorGeometry::single((8., 8.), 0.5)?)
        .build();
    assert!(matches!(
        result,
        Err(TraceSimError::Fov(FovError::UnitMismatch { .. }))
    ));
    let config = ObservationConfig {
        wave_unit: WaveUnit::Nanometer,
        wave_min: 800.,
        wave_max: 2500.,
        spectral_sampling: 1.,
        ..spectrograph()
    };
    Observation::builder()
        .config(config)
        .catalogue(catalogue)
        .detectors(DetectorGeometry::single((8., 8.), 0.5)?)
        .build()?;
    Ok(())
}

#[test]
fn overlapping_orders_add_up() -> Result<()> {
    init();
    let catalogue = two_orders()?;
    let mut source = SourceField::new();
    let s = source.add_spectrum(Spectrum::Flat { photon_flux: 4. });
    source.extended(SkyBox::new(-0.5, 0.5, -0.02, 0.02), s, 1.)?;

    let both = observation(spectrograph(), catalogue.clone())?.observe(&source)?;
    let first = observation(spectrograph(), only(&catalogue, "order_1")?)?.observe(&source)?;
    let second = observation(spectrograph(), only(&catalogue, "order_2")?)?.observe(&source)?;

    let scale = both.images()[0].max();
    for ((ab, a), b) in both.images()[0]
        .data()
        .iter()
        .zip(first.images()[0].data())
        .zip(second.images()[0].data())
    {
        assert!((ab - (a + b)).abs() <= 1e-9 * scale);
    }
    assert!(
        (both.total_counts() - first.total_counts() - second.total_counts()).abs()
            < 1e-9 * both.total_counts()
    );
    Ok(())
}

#[test]
fn dispersed_line_position() -> Result<()> {
    init();
    let observation = observation(spectrograph(), only(&two_orders()?, "order_1")?)?;
    let source = point(0.2, 0., Spectrum::Line { wave: 1.5, flux: 10. })?;
    let exposure = observation.observe(&source)?;
    let image = &exposure.images()[0];
    assert!((image.sum() - 10.).abs() < 1e-9);
    // x = 0.2mm, y = 0mm on 0.5mm pixels centred on 7.5
    let (cx, cy) = image
        .centroid()
        .ok_or_else(|| anyhow::anyhow!("blank image"))?;
    assert!((cx - 7.9).abs() < 1e-9, "{cx}");
    assert!((cy - 7.5).abs() < 1e-9, "{cy}");

    let again = observation.observe(&source)?;
    assert_eq!(image.data(), again.images()[0].data());
    Ok(())
}

#[test]
fn malformed_catalogue() {
    init();
    match TraceCatalogue::load(data("ragged.toml"), ExpectedUnits::default()) {
        Err(CatalogueError::InFile(path, e)) => {
            assert!(path.ends_with("ragged.toml"));
            assert!(matches!(
                *e,
                CatalogueError::Malformed {
                    extension_id: 2,
                    ..
                }
            ));
        }
        other => panic!("expected a malformed catalogue, found {other:?}"),
    }
    assert!(matches!(
        TraceCatalogue::load(data("missing.toml"), ExpectedUnits::default()),
        Err(CatalogueError::Open(..))
    ));
}

#[test]
fn catalogue_unit_mismatch() {
    init();
    match TraceCatalogue::load(data("nm_units.toml"), ExpectedUnits::default()) {
        Err(CatalogueError::InFile(_, e)) => match *e {
            CatalogueError::UnitMismatch {
                column,
                found,
                expected,
                ..
            } => {
                assert_eq!(column, "wavelength");
                assert_eq!(found, "nm");
                assert_eq!(expected, "um");
            }
            e => panic!("expected a unit mismatch, found {e:?}"),
        },
        other => panic!("expected a unit mismatch, found {other:?}"),
    }
}

#[test]
fn tile_ceiling() -> Result<()> {
    init();
    let mut config = spectrograph();
    config.tiling.max_tiles = 3;
    let observation = observation(config, two_orders()?)?;
    let source = point(0.2, 0., Spectrum::Flat { photon_flux: 1. })?;
    assert!(matches!(
        observation.observe(&source),
        Err(TraceSimError::Fov(FovError::TooManyTiles { limit: 3 }))
    ));
    Ok(())
}

#[test]
fn empty_intersection() -> Result<()> {
    init();
    let observation = observation(spectrograph(), two_orders()?)?;

    let off_slit = point(50., 0., Spectrum::Flat { photon_flux: 1. })?;
    let exposure = observation.observe(&off_slit)?;
    assert_eq!(exposure.total_counts(), 0.);
    assert!(exposure
        .diagnostics()
        .contains(&FovDiagnostic::NoSpatialOverlap));

    let off_band = point(0., 0., Spectrum::Line { wave: 3., flux: 1. })?;
    let plan = observation.plan(&off_band)?;
    assert!(plan.no_overlap());
    assert!(plan
        .diagnostics
        .contains(&FovDiagnostic::NoSpectralOverlap));
    Ok(())
}

#[test]
fn cancelled_observation() -> Result<()> {
    init();
    let observation = observation(spectrograph(), two_orders()?)?;
    let source = point(0.2, 0., Spectrum::Flat { photon_flux: 1. })?;
    observation.cancel_handle().cancel();
    let exposure = observation.observe(&source)?;
    let summary = exposure.summary();
    assert!(summary.cancelled && summary.is_degraded());
    assert_eq!(summary.tiles_processed, 0);
    assert_eq!(exposure.total_counts(), 0.);

    // the cancellation only stops one run
    let exposure = observation.observe(&source)?;
    assert!(!exposure.summary().cancelled);
    assert!((exposure.total_counts() - 1.8).abs() < 1e-9);
    Ok(())
}

#[test]
fn throughput_and_quantum_efficiency() -> Result<()> {
    init();
    let effects = EffectList::new()
        .push(
            "telescope",
            0,
            Effect::Throughput {
                curve: TransmissionCurve::constant(0.5),
            },
        )?
        .push(
            "detector_qe",
            10,
            Effect::QuantumEfficiency {
                curve: TransmissionCurve::constant(0.8),
            },
        )?;
    let observation = Observation::builder()
        .config(spectrograph())
        .catalogue(only(&two_orders()?, "order_1")?)
        .detectors(DetectorGeometry::single((8., 8.), 0.5)?)
        .effects(effects.clone())
        .build()?;
    let source = point(0., 0., Spectrum::Line { wave: 1.5, flux: 10. })?;
    let exposure = observation.observe(&source)?;
    assert_eq!(exposure.unit(), Some(CountUnit::Electrons));
    assert!((exposure.total_counts() - 4.).abs() < 1e-9);

    let observation = Observation::builder()
        .config(spectrograph())
        .catalogue(only(&two_orders()?, "order_1")?)
        .detectors(DetectorGeometry::single((8., 8.), 0.5)?)
        .effects(effects.with_enabled("detector_qe", false)?)
        .build()?;
    let exposure = observation.observe(&source)?;
    assert_eq!(exposure.unit(), Some(CountUnit::Photons));
    assert!((exposure.total_counts() - 5.).abs() < 1e-9);
    Ok(())
}

#[test]
fn catalogue_save_and_load() -> Result<()> {
    init();
    let catalogue = two_orders()?;
    let path = std::env::temp_dir().join("tracesim_two_orders.toml");
    catalogue.save(&path)?;
    let loaded = TraceCatalogue::load(&path, ExpectedUnits::default())?;
    std::fs::remove_file(&path)?;
    assert_eq!(loaded.len(), catalogue.len());
    assert_eq!(loaded.header(), catalogue.header());
    for (a, b) in loaded.iter().zip(catalogue.iter()) {
        assert_eq!(a.name(), b.name());
        assert_eq!(a.domain(), b.domain());
        assert_eq!(a.forward(0.3, 1.6, Default::default())?, b.forward(0.3, 1.6, Default::default())?);
    }
    Ok(())
}
