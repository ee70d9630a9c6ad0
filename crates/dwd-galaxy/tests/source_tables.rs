use std::fs;
use std::path::Path;

use dwd_core::constants::Z_SUN;
use dwd_core::{BinaryType, MetallicityGrid};
use dwd_galaxy::source::{
    hosts_in_bin, load_population, load_star_particles, CsvPopulationSource, PopulationSource,
};

const CONV: &str = "bin_num,mass_1,mass_2,kstar_1,kstar_2,porb,sep,met,tphys,rad_1,rad_2,evol_type\n\
                    0,0.6,0.6,11.0,11.0,0.3,2.4,0.0001,100.0,1.0,1.0,1\n\
                    1,0.7,0.5,11.0,11.0,0.5,3.0,0.0001,250.0,1.0,1.0,1\n";

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, contents).expect("write");
}

#[test]
fn mass_stars_is_preferred() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let source = CsvPopulationSource::new(temp.path());
    let dir = source.table_dir(BinaryType::COCO, 0.0001);
    assert!(dir.ends_with("11_11/0.0001"));
    write(&dir.join("conv.csv"), CONV);
    write(&dir.join("mass_stars.csv"), "mass_stars\n100.0\n2500.5\n");
    write(&dir.join("mass_binaries.csv"), "mass_binaries\n99.0\n");
    assert_eq!(
        source.mass_binaries(BinaryType::COCO, 0.0001).expect("mass"),
        2500.5
    );
}

#[test]
fn mass_binaries_is_the_fallback() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let source = CsvPopulationSource::new(temp.path());
    let dir = source.table_dir(BinaryType::HeHe, 0.03);
    write(&dir.join("mass_binaries.csv"), "mass_binaries\n10.0\n1234.0\n");
    assert_eq!(
        source.mass_binaries(BinaryType::HeHe, 0.03).expect("fallback"),
        1234.0
    );
}

#[test]
fn missing_normalisation_is_a_lookup_failure() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let source = CsvPopulationSource::new(temp.path());
    let err = source
        .mass_binaries(BinaryType::ONeX, 0.0001)
        .expect_err("no tables");
    assert_eq!(err.info().code, "mass-normalisation");
    assert!(!err.is_missing_dataset());

    let err = source.conv(BinaryType::ONeX, 0.0001).expect_err("no conv");
    assert!(err.is_missing_dataset());
}

#[test]
fn population_radii_follow_mass_radius_relation() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let source = CsvPopulationSource::new(temp.path());
    let dir = source.table_dir(BinaryType::COCO, 0.0001);
    write(&dir.join("conv.csv"), CONV);
    write(&dir.join("mass_stars.csv"), "mass_stars\n5000.0\n");
    let population = load_population(&source, BinaryType::COCO, 0.0001).expect("load");
    assert_eq!(population.binaries.len(), 2);
    assert_eq!(population.mass_binaries, 5000.0);
    assert!((population.binaries[0].rad_2 - 0.012_778_467).abs() < 1e-8);
    assert!(population.binaries[1].rad_1 < population.binaries[1].rad_2);
}

#[test]
fn catalog_rows_keep_their_load_index() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let path = temp.path().join("FIRE.csv");
    write(
        &path,
        "met,xGx,yGx,zGx,kern_len,age\n\
         1.2,0.0,0.0,0.0,0.01,9.0\n\
         0.3,1.0,0.0,0.0,0.01,8.0\n\
         0.3,2.0,0.0,0.0,0.01,7.0\n\
         0.0001,3.0,0.0,0.0,0.01,6.0\n",
    );
    let hosts = load_star_particles(&path).expect("catalog");
    let order: Vec<u64> = hosts.iter().map(|h| h.fire_index).collect();
    assert_eq!(order, vec![3, 1, 2, 0]);
    assert_eq!(hosts[1].x_gx, 1.0);
}

#[test]
fn boundary_hosts_fall_in_exactly_one_bin() {
    let grid = MetallicityGrid::reference();
    let mut catalog: Vec<dwd_core::HostParticle> = grid
        .boundaries()
        .iter()
        .enumerate()
        .map(|(i, &edge)| dwd_core::HostParticle {
            met: edge / Z_SUN,
            x_gx: 0.0,
            y_gx: 0.0,
            z_gx: 0.0,
            kern_len: 0.0,
            age: 1.0,
            fire_index: i as u64,
        })
        .collect();
    catalog.push(dwd_core::HostParticle {
        met: 40.0,
        fire_index: 99,
        ..catalog[0]
    });

    let mut seen = Vec::new();
    for bin in grid.bins() {
        let slice = hosts_in_bin(&catalog, &bin);
        for host in slice {
            assert!(bin.contains_host(host.met));
        }
        seen.extend(slice.iter().map(|h| h.fire_index));
    }
    seen.sort_unstable();
    let mut expected: Vec<u64> = (0..16).collect();
    expected.push(99);
    assert_eq!(seen, expected);

    let first = grid.bin(0).expect("bin");
    let ids: Vec<u64> = hosts_in_bin(&catalog, &first)
        .iter()
        .map(|h| h.fire_index)
        .collect();
    assert_eq!(ids, vec![0], "upper edge belongs to the next bin");
    let last = grid.bin(14).expect("bin");
    let ids: Vec<u64> = hosts_in_bin(&catalog, &last)
        .iter()
        .map(|h| h.fire_index)
        .collect();
    assert_eq!(ids, vec![14, 15, 99]);
}
