use rusty_synphot::synth::math;
use rusty_synphot::{
    FluxUnit, Force, Observation, Overlap, SourceSpectrum, SpectralElement, SynphotError, WaveUnit,
};

fn v_band() -> SpectralElement {
    SpectralElement::box_filter(5500.0, 880.0, WaveUnit::Angstrom)
        .unwrap()
        .with_name("v_box")
}

fn close(a: f64, b: f64, rel: f64) -> bool {
    (a - b).abs() <= rel * a.abs().max(b.abs())
}

#[test]
fn sampling_own_grid_returns_own_flux_in_every_unit() {
    let mut sp = SourceSpectrum::tabular(
        vec![3000.0, 4000.0, 5000.0, 6000.0],
        vec![1e-15, 3e-15, 2e-15, 4e-15],
        WaveUnit::Angstrom,
        FluxUnit::Flam,
    )
    .unwrap();
    for waveunit in WaveUnit::ALL {
        for fluxunit in [FluxUnit::Flam, FluxUnit::Fnu, FluxUnit::AbMag, FluxUnit::Jansky] {
            sp.convert_wave(waveunit);
            sp.convert_flux(fluxunit);
            let sampled = sp.call(&sp.wave());
            let flux = sp.flux();
            assert_eq!(sampled.len(), flux.len());
            for (a, b) in sampled.iter().zip(&flux) {
                assert!(close(*a, *b, 1e-9), "{waveunit}/{fluxunit}: {a} vs {b}");
            }
        }
    }
}

#[test]
fn analytic_models_sample_to_vectors() {
    let bb = SourceSpectrum::blackbody(5000.0).unwrap();
    assert_eq!(bb.call(&[5000.0]).len(), 1);
    assert!(bb.waveset().is_none());
    assert_eq!(bb.wave().len(), math::DEFAULT_WAVESET_POINTS);

    let band = SpectralElement::uniform(0.5).unwrap();
    assert_eq!(band.call(&[1.0, 2.0, 3.0]), vec![0.5, 0.5, 0.5]);
}

#[test]
fn composite_keeps_left_units_and_merges_wavesets() {
    let left = SourceSpectrum::tabular(
        vec![400.0, 500.0],
        vec![1.0, 1.0],
        WaveUnit::Nanometer,
        FluxUnit::Photlam,
    )
    .unwrap();
    let right = SourceSpectrum::tabular(
        vec![4500.0, 5500.0],
        vec![1.0, 1.0],
        WaveUnit::Angstrom,
        FluxUnit::Flam,
    )
    .unwrap();
    let sum = left + right;
    assert_eq!(sum.waveunits(), WaveUnit::Nanometer);
    assert_eq!(sum.fluxunits(), FluxUnit::Photlam);
    assert_eq!(sum.wave_angstrom(), vec![4000.0, 4500.0, 5000.0, 5500.0]);
}

#[test]
fn renorm_then_observe_reproduces_target() {
    let star = SourceSpectrum::blackbody(9600.0)
        .unwrap()
        .renorm(10.0, FluxUnit::AbMag, &v_band())
        .unwrap();
    let obs = Observation::new(star, v_band(), None, None).unwrap();
    let abmag = obs.effstim(FluxUnit::AbMag, None).unwrap();
    assert!((abmag - 10.0).abs() < 1e-6);
    assert!(obs.countrate(true, None) > 0.0);
    let pivot = obs.pivot();
    assert!(pivot > 5060.0 && pivot < 5940.0);
}

#[test]
fn count_rate_scales_with_area() {
    let flat = SourceSpectrum::flat(1.0, FluxUnit::Photlam).unwrap();
    let band = v_band().with_binset(math::lin_space(5000.0, 6000.0, 101)).unwrap();
    let obs = band.observe(&flat, None, None).unwrap();
    let small = obs.countrate(true, Some(1.0));
    let large = obs.countrate(true, Some(100.0));
    assert!(close(large, 100.0 * small, 1e-12));
    // photlam of 1 over an 880 A box on 1 cm^2
    assert!(close(small, band.equivwidth(), 1e-2));
}

#[test]
fn overlap_policy() {
    let table = SourceSpectrum::tabular(
        vec![5000.0, 5600.0],
        vec![1.0, 1.0],
        WaveUnit::Angstrom,
        FluxUnit::Photlam,
    )
    .unwrap();
    assert_eq!(table.check_overlap(&v_band()), Overlap::Partial);
    let err = Observation::new(table.clone(), v_band(), None, None).unwrap_err();
    assert!(err.is_overlap_error());

    let force: Force = "extrap".parse().unwrap();
    assert!(Observation::new(table, v_band(), None, Some(force)).is_ok());
}

#[test]
fn redshift_stretches_wavelengths_only() {
    let sp = SourceSpectrum::tabular(
        vec![1000.0, 2000.0],
        vec![5.0, 6.0],
        WaveUnit::Angstrom,
        FluxUnit::Photlam,
    )
    .unwrap();
    let shifted = sp.redshift(1.0).unwrap();
    assert_eq!(shifted.wave(), vec![2000.0, 4000.0]);
    assert_eq!(shifted.flux(), vec![5.0, 6.0]);
    assert!(matches!(sp.redshift(-1.0), Err(SynphotError::InvalidInput(_))));
}
