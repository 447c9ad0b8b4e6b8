// file_round_trip.rs -- save/load through real files for all three formats

use qfmd_formats::convert::{
    build_md2_tris, calc_mdl_bounds, convert_stverts, make_md2_frame, make_md3_frame,
    make_mdl_frame, md2_frame_positions, md3_frame_verts, md3_surface_positions,
    mdl_frame_positions, weld_surface,
};
use qfmd_formats::md3::Md3Shader;
use qfmd_formats::{Md2, Md3, Md3Surface, Mdl, MdlFrameKind, MdlSkin, MdlStVert, MdlTriangle};

fn tri_faces() -> (Vec<Vec<usize>>, Vec<Vec<[f32; 2]>>) {
    (
        vec![vec![0, 1, 2]],
        vec![vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]],
    )
}

const POSITIONS: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [16.0, 0.0, 0.0], [0.0, 16.0, 8.0]];
const NORMALS: [[f32; 3]; 3] = [[0.0, 0.0, 1.0]; 3];

#[test]
fn md2_survives_a_disk_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tri.md2");

    let (faces, uvs) = tri_faces();
    let mut mdl = Md2::new("tri");
    mdl.skinwidth = 64;
    mdl.skinheight = 64;
    mdl.skins.push("tri.pcx".to_string());
    let (tris, welded) = build_md2_tris(&faces, &uvs).unwrap();
    mdl.tris = tris;
    mdl.stverts = convert_stverts(&welded, 64, 64);
    mdl.frames.push(make_md2_frame("only", &POSITIONS, &NORMALS));

    mdl.save(&path).unwrap();
    let reread = Md2::load(&path).unwrap();
    assert_eq!(reread.name, "tri");
    assert_eq!(reread.tris, mdl.tris);

    let restored = md2_frame_positions(&reread.frames[0]);
    for (p, r) in POSITIONS.iter().zip(&restored) {
        for i in 0..3 {
            assert!((p[i] - r[i]).abs() <= reread.frames[0].scale[i] + 1e-6);
        }
    }
}

#[test]
fn md3_survives_a_disk_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tri.md3");

    let (faces, uvs) = tri_faces();
    let welded = weld_surface(&faces, &uvs).unwrap();

    let mut surf = Md3Surface::new("body");
    surf.shaders.push(Md3Shader {
        name: "body.tga".to_string(),
        index: 0,
    });
    surf.triangles = welded.triangles;
    surf.texcoords = welded.texcoords;
    surf.verts = md3_frame_verts(&POSITIONS, &NORMALS, &welded.vertmap).unwrap();

    let mut mdl = Md3::new("models/tri.md3");
    mdl.frames.push(make_md3_frame("only", &POSITIONS));
    mdl.surfaces.push(surf);

    mdl.save(&path).unwrap();
    let reread = Md3::load(&path).unwrap();
    assert_eq!(reread, mdl);

    // 1/64 fixed point restores these positions exactly
    let restored = md3_surface_positions(&reread.surfaces[0], 0);
    for &slot in &welded.vertmap {
        assert!(restored.iter().any(|r| *r == POSITIONS[slot]));
    }
}

#[test]
fn mdl_survives_a_disk_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tri.mdl");

    let frames = vec![POSITIONS.to_vec(), POSITIONS.to_vec()];
    let (scale, origin) = calc_mdl_bounds(&frames);

    let mut mdl = Mdl::new("tri");
    mdl.scale = scale;
    mdl.origin = origin;
    mdl.skinwidth = 8;
    mdl.skinheight = 8;
    mdl.skins.push(MdlSkin::Single(vec![0; 64]));
    mdl.stverts = vec![MdlStVert { onseam: 0, s: 0, t: 0 }; 3];
    mdl.tris.push(MdlTriangle {
        facesfront: 1,
        vertindex: [2, 1, 0],
    });
    for (i, positions) in frames.iter().enumerate() {
        mdl.frames.push(MdlFrameKind::Simple(make_mdl_frame(
            &format!("pose{}", i),
            positions,
            &NORMALS,
            &scale,
            &origin,
        )));
    }

    mdl.save(&path).unwrap();
    let reread = Mdl::load(&path).unwrap();
    assert_eq!(reread.scale, mdl.scale);
    assert_eq!(reread.frames, mdl.frames);

    if let MdlFrameKind::Simple(frame) = &reread.frames[0] {
        let restored = mdl_frame_positions(frame, &reread.scale, &reread.origin);
        for (p, r) in POSITIONS.iter().zip(&restored) {
            for i in 0..3 {
                assert!((p[i] - r[i]).abs() <= reread.scale[i] + 1e-6);
            }
        }
    } else {
        panic!("expected a simple frame");
    }
}

#[test]
fn md2_load_reports_garbage_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.md2");
    std::fs::write(&path, b"not a model at all").unwrap();
    assert!(Md2::load(&path).is_err());
}
