use proptest::prelude::*;

use ucm_updater::updater::{
    Arch, Asset, AssetSelector, InstallerKind, Platform, ReleaseInfo, Version,
};

fn release(names: Vec<String>) -> ReleaseInfo {
    ReleaseInfo {
        version: Version::new(1, 0, 0),
        tag: "v1.0.0".to_string(),
        name: String::new(),
        body: String::new(),
        assets: names
            .into_iter()
            .map(|name| Asset {
                download_url: format!("https://example.invalid/{name}"),
                name,
                size: 0,
            })
            .collect(),
        published_at: None,
    }
}

fn arb_asset_name() -> impl Strategy<Value = String> {
    let ext = prop_oneof![
        Just(".dmg"),
        Just(".pkg"),
        Just(".exe"),
        Just(".msi"),
        Just(".deb"),
        Just(".rpm"),
        Just(".zip"),
        Just(".tar.gz"),
        Just(".dmg.sha256"),
        Just(".deb.sha256"),
    ];
    let arch = prop_oneof![Just(""), Just("-x86_64"), Just("-arm64"), Just("_amd64")];
    ("[a-z]{3,10}", arch, ext).prop_map(|(stem, arch, ext)| format!("{stem}{arch}{ext}"))
}

fn arb_platform() -> impl Strategy<Value = (Platform, Vec<InstallerKind>)> {
    prop_oneof![
        Just((Platform::MacOs, vec![InstallerKind::Dmg, InstallerKind::Pkg])),
        Just((Platform::Windows, vec![InstallerKind::Exe, InstallerKind::Msi])),
        Just((Platform::Linux, vec![InstallerKind::Deb, InstallerKind::Rpm])),
        Just((Platform::Linux, vec![InstallerKind::Rpm, InstallerKind::Deb])),
    ]
}

proptest! {
    #[test]
    fn selection_is_deterministic_and_platform_correct(
        names in prop::collection::vec(arb_asset_name(), 0..8),
        (platform, kinds) in arb_platform(),
    ) {
        let info = release(names);
        let selector = AssetSelector::new(platform, Arch::X86_64).with_kinds(kinds.clone());

        let first = selector.select(&info).ok().map(|a| a.name.clone());
        let second = selector.select(&info).ok().map(|a| a.name.clone());
        prop_assert_eq!(&first, &second);

        let installers: Vec<_> = info.assets.iter().filter(|a| !a.is_checksum_file()).collect();
        let has_candidate = installers.iter().any(|a| {
            kinds.iter().any(|k| a.name.to_lowercase().contains(k.extension()))
        });
        prop_assert_eq!(first.is_some(), has_candidate);

        if let Some(name) = first {
            let kind = InstallerKind::from_file_name(&name);
            prop_assert!(kind.is_some_and(|k| kinds.contains(&k)));
            // No candidate of a strictly better kind was passed over.
            let rank = kinds.iter().position(|k| Some(*k) == kind).unwrap();
            for better in &kinds[..rank] {
                let passed_over = installers
                    .iter()
                    .any(|a| a.name.to_lowercase().contains(better.extension()));
                prop_assert!(!passed_over);
            }
        }
    }
}
