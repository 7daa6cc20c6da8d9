use rand::Rng;
use std::io::{BufWriter, Write};
use tempfile::NamedTempFile;

const DISTRICTS: [&str; 6] = [
    "Moema",
    "Pinheiros",
    "Vila Mariana",
    "Butantã",
    "Santana",
    "Sé",
];

/// Synthetic listings CSV with `rows` data lines
pub fn listings_csv(rows: usize) -> NamedTempFile {
    let tmp = NamedTempFile::new().unwrap();
    let mut writer = BufWriter::new(tmp.reopen().unwrap());
    writeln!(
        writer,
        "Preço,Condomínio,Tamanho,Quartos,Suítes,Vagas,Piscina,Distrito,Tipo de Negociação,Latitude,Longitude"
    )
    .unwrap();

    let mut rng = rand::rng();
    for _ in 0..rows {
        let size: i64 = rng.random_range(25..400);
        let rent = rng.random_bool(0.5);
        let price = size
            * if rent {
                rng.random_range(20..90)
            } else {
                rng.random_range(5_000..18_000)
            };
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{:.5},{:.5}",
            price,
            size * rng.random_range(5..25),
            size,
            rng.random_range(1..6),
            rng.random_range(0..3),
            rng.random_range(0..5),
            rng.random_bool(0.3) as u8,
            DISTRICTS[rng.random_range(0..DISTRICTS.len())],
            if rent { "rent" } else { "sale" },
            -23.5505 + rng.random_range(-0.1..0.1),
            -46.6333 + rng.random_range(-0.1..0.1),
        )
        .unwrap();
    }
    writer.flush().unwrap();
    drop(writer);
    tmp
}
