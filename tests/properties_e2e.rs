use calohits::{
    CaloHit, DetectorRegion, HitContext, HitId, HitSettings, HitType, OrderedHitList, PseudoLayer,
};

fn barrel_hit(hit_type: HitType, layer: PseudoLayer, y: f32, z: f32) -> CaloHit {
    CaloHit::builder()
        .position(1800.0, y, z)
        .cell_size(10.0, 10.0)
        .hit_type(hit_type)
        .region(DetectorRegion::Barrel)
        .pseudo_layer(layer)
        .mip_equivalent_energy(1.0)
        .hadronic_energy(0.5)
        .build()
        .unwrap()
}

fn build(settings: HitSettings, hits: Vec<CaloHit>) -> (HitContext, Vec<HitId>, OrderedHitList) {
    let mut ctx = HitContext::new(settings).unwrap();
    let layers = OrderedHitList::from_hits(&hits).unwrap();
    let ids = hits.into_iter().map(|h| ctx.add_hit(h).unwrap()).collect();
    (ctx, ids, layers)
}

#[test]
fn coincident_hits_fail_density_weight() {
    let (mut ctx, ids, layers) = build(
        HitSettings::default(),
        vec![
            barrel_hit(HitType::Ecal, 5, 0.0, 0.0),
            barrel_hit(HitType::Ecal, 5, 0.0, 0.0),
        ],
    );

    let err = ctx.calculate_properties(ids[0], &layers).unwrap_err();
    assert!(err.is_failure());
    let hit = ctx.store().get(ids[0]).unwrap();
    assert_eq!(hit.density_weight(), 0.0);
    assert!(!hit.density_weight().is_nan());

    assert!(ctx.calculate_all_properties(&layers).unwrap_err().is_failure());
}

#[test]
fn track_like_column_is_not_isolated() {
    // One hit per layer, stepping one cell along z.
    let hits: Vec<CaloHit> = (0..6u32)
        .map(|layer| barrel_hit(HitType::Ecal, layer, 0.0, (layer * 10) as f32))
        .collect();
    let (mut ctx, ids, layers) = build(HitSettings::default(), hits);

    ctx.calculate_all_properties(&layers).unwrap();

    for &id in &ids {
        let hit = ctx.store().get(id).unwrap();
        assert!(hit.density_weight() > 0.0);
        assert!(!hit.is_isolated(), "hit in layer {} flagged isolated", hit.pseudo_layer);
        assert!(hit.is_possible_mip());
    }
}

#[test]
fn far_hit_is_isolated_and_mip() {
    let (mut ctx, ids, layers) = build(
        HitSettings::default(),
        vec![
            barrel_hit(HitType::Ecal, 3, 0.0, 0.0),
            barrel_hit(HitType::Ecal, 3, 0.0, 900.0),
        ],
    );

    let props = ctx.calculate_properties(ids[0], &layers).unwrap();
    assert!(props.isolated);
    assert!(props.possible_mip);
    assert_eq!(props.density_weight, 0.0);
    assert_eq!(props.surrounding_energy, 0.0);
}

#[test]
fn surrounding_energy_accumulates_across_calls() {
    let (mut ctx, ids, layers) = build(
        HitSettings::default(),
        vec![
            barrel_hit(HitType::Hcal, 2, 0.0, 0.0),
            barrel_hit(HitType::Hcal, 2, 10.0, 0.0),
        ],
    );

    ctx.calculate_properties(ids[0], &layers).unwrap();
    ctx.calculate_properties(ids[0], &layers).unwrap();

    let hit = ctx.store().get(ids[0]).unwrap();
    assert!((hit.surrounding_energy() - 1.0).abs() < 1e-6);
    // Density weight is assigned, not accumulated.
    assert!((hit.density_weight() - 1.0).abs() < 1e-3);
}

#[test]
fn reset_starts_a_fresh_pass() {
    let (mut ctx, ids, layers) = build(
        HitSettings::default(),
        vec![
            barrel_hit(HitType::Hcal, 2, 0.0, 0.0),
            barrel_hit(HitType::Hcal, 2, 10.0, 0.0),
        ],
    );

    ctx.calculate_all_properties(&layers).unwrap();
    ctx.reset_derived_properties();
    let hit = ctx.store().get(ids[0]).unwrap();
    assert_eq!(hit.surrounding_energy(), 0.0);
    assert_eq!(hit.density_weight(), 0.0);
    assert!(!hit.is_possible_mip());

    ctx.calculate_all_properties(&layers).unwrap();
    let hit = ctx.store().get(ids[0]).unwrap();
    assert!((hit.surrounding_energy() - 0.5).abs() < 1e-6);
    assert!(hit.is_possible_mip());
}

#[test]
fn simple_scheme_uses_type_dependent_cut() {
    let settings = HitSettings {
        use_simple_isolation_scheme: true,
        ..HitSettings::default()
    };
    // Two ECAL hits 20 mm apart: weight 100 / 400 = 0.25, below the ECAL cut of 0.5.
    // Two HCAL hits 15 mm apart: weight 100 / 225 ~ 0.44, above the HCAL cut of 0.25.
    let (mut ctx, ids, layers) = build(
        settings,
        vec![
            barrel_hit(HitType::Ecal, 1, 0.0, 0.0),
            barrel_hit(HitType::Ecal, 1, 20.0, 0.0),
            barrel_hit(HitType::Hcal, 20, 0.0, 0.0),
            barrel_hit(HitType::Hcal, 20, 15.0, 0.0),
        ],
    );

    ctx.calculate_all_properties(&layers).unwrap();

    let isolated: Vec<bool> = ids
        .iter()
        .map(|&id| ctx.store().get(id).unwrap().is_isolated())
        .collect();
    assert_eq!(isolated, vec![true, true, false, false]);

    // Re-running the pass reports the same two hits.
    assert_eq!(ctx.apply_simple_isolation_scheme(&ids).unwrap(), 2);
}

#[test]
fn energetic_endcap_hit_is_not_mip() {
    let hit = CaloHit::builder()
        .position(300.0, 400.0, 2500.0)
        .cell_size(10.0, 10.0)
        .hit_type(HitType::Ecal)
        .region(DetectorRegion::Endcap)
        .pseudo_layer(4)
        .mip_equivalent_energy(6.0)
        .build()
        .unwrap();
    let (mut ctx, ids, layers) = build(HitSettings::default(), vec![hit]);

    // Angular correction |p| / |z| is about 1.02, so the cut is about 5.1.
    let props = ctx.calculate_properties(ids[0], &layers).unwrap();
    assert!(!props.possible_mip);
}

#[test]
fn settings_from_json_drive_the_calculator() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"density_weight_n_layers": 0, "density_weight_power": 1}"#).unwrap();
    let settings = HitSettings::from_json_file(&path).unwrap();

    let (mut ctx, ids, layers) = build(
        settings,
        vec![
            barrel_hit(HitType::Ecal, 3, 0.0, 0.0),
            barrel_hit(HitType::Ecal, 3, 10.0, 0.0),
            barrel_hit(HitType::Ecal, 4, 10.0, 0.0),
        ],
    );

    let props = ctx.calculate_properties(ids[0], &layers).unwrap();
    // Only layer 3 is in the window; 100 / 10 = 10.
    assert!((props.density_weight - 10.0).abs() < 1e-3);
}
