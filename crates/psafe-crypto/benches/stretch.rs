use psafe_crypto::{stretch_key, SALT_SIZE};
use secrecy::SecretString;

#[divan::bench(args = [0, 2048, 262144])]
fn bench_stretch_key(bencher: divan::Bencher, iterations: u32) {
    let passphrase = SecretString::from("correct horse battery staple");
    let salt = [0x5Au8; SALT_SIZE];
    bencher.bench(|| {
        stretch_key(
            divan::black_box(&passphrase),
            divan::black_box(&salt),
            iterations,
        )
    });
}

fn main() {
    divan::main();
}
