use clap::Parser;
use rand::Rng;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

const DISTRICTS: [&str; 8] = [
    "Moema",
    "Pinheiros",
    "Vila Mariana",
    "Butantã",
    "Santana",
    "Tatuapé",
    "Sé",
    "Lapa",
];

const HEADER: &str = "Preço,Condomínio,Tamanho,Quartos,Banheiros,Suítes,Vagas,Elevador,Mobiliado,Piscina,Novo,Distrito,Tipo de Negociação,Tipo de Propriedade,Latitude,Longitude";

fn generate(path: &Path, rows: usize) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{}", HEADER)?;

    let mut rng = rand::rng();
    for _ in 0..rows {
        let size: i64 = rng.random_range(25..400);
        let rooms: i64 = rng.random_range(1..6);
        let suites: i64 = rng.random_range(0..=rooms.min(4));
        let parking: i64 = rng.random_range(0..5);
        let pool = rng.random_bool(0.3) as u8;
        let district = DISTRICTS[rng.random_range(0..DISTRICTS.len())];
        let rent = rng.random_bool(0.45);
        let price = if rent {
            size * rng.random_range(20..90)
        } else {
            size * rng.random_range(5_000..18_000)
        };
        let condo = size * rng.random_range(5..25);
        let lat = -23.5505 + rng.random_range(-0.15..0.15);
        let lon = -46.6333 + rng.random_range(-0.15..0.15);

        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},apartment,{:.6},{:.6}",
            price,
            condo,
            size,
            rooms,
            rng.random_range(1..=rooms + 1),
            suites,
            parking,
            rng.random_bool(0.6) as u8,
            rng.random_bool(0.2) as u8,
            pool,
            rng.random_bool(0.1) as u8,
            district,
            if rent { "rent" } else { "sale" },
            lat,
            lon,
        )?;
    }

    writer.flush()
}

#[derive(Parser, Debug)]
#[command(name = "data_generator", about = "Synthetic São Paulo listings CSV generator")]
struct Args {
    /// Output CSV path.
    #[arg(default_value = "data/imoveis-sao-paulo.csv")]
    path: PathBuf,
    /// Number of listings to write.
    #[arg(default_value_t = 1_000_000)]
    rows: usize,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    generate(&args.path, args.rows)?;

    println!(
        "Sample listings CSV generated: {} ({} rows)",
        args.path.display(),
        args.rows
    );
    Ok(())
}
